//! Configuration loading for the navigator

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::kind::{HierarchyRules, KindSet, NodeKind};

/// Navigator configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NavigatorConfig {
    /// Reject nodes opened under a parent of the wrong kind (default: true)
    #[serde(default = "default_enforce_hierarchy")]
    pub enforce_hierarchy: bool,

    /// Kinds that may be opened without a parent (default: ["scene"])
    #[serde(default = "default_root_kinds")]
    pub allow_root_kinds: Vec<NodeKind>,

    /// Publish the front-to-back ordering after every stack change (default: true)
    #[serde(default = "default_publish_ordering")]
    pub publish_ordering: bool,

    /// Fail a lifecycle callback that runs longer than this (default: no limit)
    #[serde(default)]
    pub callback_timeout_ms: Option<u64>,
}

fn default_enforce_hierarchy() -> bool {
    true
}

fn default_root_kinds() -> Vec<NodeKind> {
    vec![NodeKind::Scene]
}

fn default_publish_ordering() -> bool {
    true
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            enforce_hierarchy: default_enforce_hierarchy(),
            allow_root_kinds: default_root_kinds(),
            publish_ordering: default_publish_ordering(),
            callback_timeout_ms: None,
        }
    }
}

impl NavigatorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Configuration without any kind/parent validation.
    pub fn permissive() -> Self {
        Self {
            enforce_hierarchy: false,
            ..Self::default()
        }
    }

    pub fn hierarchy_rules(&self) -> HierarchyRules {
        HierarchyRules {
            enforce: self.enforce_hierarchy,
            roots: self.allow_root_kinds.iter().copied().collect::<KindSet>(),
        }
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NavError;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = NavigatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, NavigatorConfig::default());
        assert!(config.hierarchy_rules().enforce);
        assert_eq!(config.hierarchy_rules().roots, KindSet::SCENE);
        assert_eq!(config.callback_timeout(), None);
    }

    #[test]
    fn test_parse_all_fields() {
        let config = NavigatorConfig::from_toml_str(
            r#"
            enforce_hierarchy = true
            allow_root_kinds = ["scene", "window"]
            publish_ordering = false
            callback_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert!(!config.publish_ordering);
        assert_eq!(config.callback_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(
            config.hierarchy_rules().roots,
            KindSet::SCENE | KindSet::WINDOW
        );
    }

    #[test]
    fn test_invalid_kind_is_config_error() {
        let err = NavigatorConfig::from_toml_str(r#"allow_root_kinds = ["popup"]"#).unwrap_err();
        assert!(matches!(err, NavError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enforce_hierarchy = false").unwrap();

        let config = NavigatorConfig::load(file.path()).unwrap();
        assert!(!config.enforce_hierarchy);
        assert!(config.publish_ordering);
    }

    #[test]
    fn test_missing_file() {
        let err = NavigatorConfig::load(Path::new("/nonexistent/navigator.toml")).unwrap_err();
        assert!(matches!(err, NavError::Config(_)));
    }
}
