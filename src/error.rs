//! Error types for the navigator.
//!
//! Structural violations (`AlreadyRegistered`, `HasOpenChildren`,
//! `InvalidParent`) are raised before any state is touched. Failures that
//! happen while a command runs (`LifecycleCallbackFailed`, `FactoryError`)
//! are reported through that command's ticket and never stop the queue.

use thiserror::Error;

use crate::kind::NodeKind;
use crate::lifecycle::LifecyclePhase;
use crate::registry::NodeId;

/// Navigator error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("node {0} not found or not open")]
    NotFound(NodeId),

    #[error("node {0} is already registered")]
    AlreadyRegistered(NodeId),

    #[error("factory could not create '{key}': {reason}")]
    FactoryError { key: String, reason: String },

    #[error("node {id} still has {} open child node(s)", children.len())]
    HasOpenChildren { id: NodeId, children: Vec<NodeId> },

    #[error("{phase} callback failed for node {id}: {reason}")]
    LifecycleCallbackFailed {
        id: NodeId,
        phase: LifecyclePhase,
        reason: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{kind} cannot be opened under {}", parent.map_or("the root".to_string(), |p| p.to_string()))]
    InvalidParent {
        kind: NodeKind,
        parent: Option<NodeKind>,
    },

    #[error("navigator has shut down")]
    ShutDown,

    #[error("no tokio runtime available to run transitions")]
    NoRuntime,

    #[error("configuration error: {0}")]
    Config(String),
}

impl NavError {
    /// True for errors rejected by validation, before any mutation.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            NavError::AlreadyRegistered(_)
                | NavError::HasOpenChildren { .. }
                | NavError::InvalidParent { .. }
        )
    }
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

impl From<std::io::Error> for NavError {
    fn from(e: std::io::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let id = NodeId::from_raw(7);
        assert_eq!(NavError::NotFound(id).to_string(), "node #7 not found or not open");

        let err = NavError::HasOpenChildren {
            id,
            children: vec![NodeId::from_raw(8), NodeId::from_raw(9)],
        };
        assert_eq!(err.to_string(), "node #7 still has 2 open child node(s)");

        let err = NavError::InvalidParent {
            kind: NodeKind::Screen,
            parent: None,
        };
        assert_eq!(err.to_string(), "screen cannot be opened under the root");
    }

    #[test]
    fn test_structural_classification() {
        assert!(NavError::AlreadyRegistered(NodeId::from_raw(1)).is_structural());
        assert!(!NavError::Cancelled.is_structural());
        assert!(!NavError::NotFound(NodeId::from_raw(1)).is_structural());
    }
}
