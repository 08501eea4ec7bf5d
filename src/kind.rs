//! Node kinds and the parent/child rules between them.
//!
//! Kinds never change how a node behaves. They exist only so the manager
//! can reject a window opened at the root or a screen opened under a scene
//! before anything is registered.
//!
//! ```text
//! (root) ── Scene ── Window ── Screen
//! ```

use std::fmt;

use bitflags::bitflags;
use serde::Deserialize;

use crate::error::{NavError, Result};

// =============================================================================
// NodeKind
// =============================================================================

/// Category of a navigation node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Scene,
    Window,
    Screen,
}

impl NodeKind {
    /// The flag representing this kind in a [`KindSet`].
    pub fn as_set(self) -> KindSet {
        match self {
            NodeKind::Scene => KindSet::SCENE,
            NodeKind::Window => KindSet::WINDOW,
            NodeKind::Screen => KindSet::SCREEN,
        }
    }

    /// Kinds a node of this kind may be opened under.
    pub fn allowed_parents(self) -> KindSet {
        match self {
            NodeKind::Scene => KindSet::empty(),
            NodeKind::Window => KindSet::SCENE,
            NodeKind::Screen => KindSet::WINDOW,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Scene => "scene",
            NodeKind::Window => "window",
            NodeKind::Screen => "screen",
        };
        f.write_str(name)
    }
}

// =============================================================================
// KindSet
// =============================================================================

bitflags! {
    /// Set of node kinds.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KindSet: u8 {
        const SCENE  = 1 << 0;
        const WINDOW = 1 << 1;
        const SCREEN = 1 << 2;
    }
}

impl KindSet {
    pub fn contains_kind(self, kind: NodeKind) -> bool {
        self.contains(kind.as_set())
    }
}

impl FromIterator<NodeKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = NodeKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(KindSet::empty(), |set, kind| set | kind.as_set())
    }
}

// =============================================================================
// Hierarchy Rules
// =============================================================================

/// Validation rules applied before a node is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HierarchyRules {
    /// When false every combination is accepted.
    pub enforce: bool,
    /// Kinds that may be opened without a parent.
    pub roots: KindSet,
}

impl Default for HierarchyRules {
    fn default() -> Self {
        Self {
            enforce: true,
            roots: KindSet::SCENE,
        }
    }
}

impl HierarchyRules {
    /// Rules that accept any kind under any parent.
    pub fn permissive() -> Self {
        Self {
            enforce: false,
            roots: KindSet::all(),
        }
    }

    /// Check that `kind` may live under `parent` (`None` = root).
    pub fn check(&self, kind: NodeKind, parent: Option<NodeKind>) -> Result<()> {
        if !self.enforce {
            return Ok(());
        }

        let allowed = match parent {
            None => self.roots.contains_kind(kind),
            Some(parent) => kind.allowed_parents().contains_kind(parent),
        };

        if allowed {
            Ok(())
        } else {
            Err(NavError::InvalidParent { kind, parent })
        }
    }
}
