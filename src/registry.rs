//! Node Registry - Id allocation and the parent/child tree.
//!
//! Manages the lifetime of navigation node records:
//! - NodeId allocation (monotonic, never reused)
//! - Id → record mapping with O(1) lookups
//! - Ordered children per parent (insertion order = recency order)
//! - The "active child" flag (at most one active child per parent)
//! - Retired ids, so a closed id can never come back
//!
//! The registry is pure data. It never fires callbacks and never cascades:
//! unregistering a node orphans its children instead of removing them.
//! Cascading (or refusing to) is the manager's business.
//!
//! Parents are referenced by id, never by pointer, so the registry alone
//! owns node records and cycles cannot form.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{NavError, Result};
use crate::kind::NodeKind;
use crate::lifecycle::NodePhase;

// =============================================================================
// NodeId
// =============================================================================

/// Process-unique identifier of a navigation node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap an externally derived id (e.g. a host instance handle).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Records
// =============================================================================

/// A registered node plus the payload the owner attaches to it.
#[derive(Debug)]
pub struct NodeRecord<T> {
    id: NodeId,
    kind: NodeKind,
    key: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    active: bool,
    phase: NodePhase,
    payload: T,
}

impl<T> NodeRecord<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Owned snapshot without the payload.
    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            kind: self.kind,
            key: self.key.clone(),
            parent: self.parent,
            children: self.children.clone(),
            active: self.active,
            phase: self.phase,
        }
    }
}

/// Read-only snapshot of a node, safe to hand out of the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub kind: NodeKind,
    pub key: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub active: bool,
    pub phase: NodePhase,
}

/// Arguments for [`NodeRegistry::register`].
#[derive(Debug)]
pub struct NewNode<T> {
    /// Explicit id, or `None` to allocate one.
    pub id: Option<NodeId>,
    pub kind: NodeKind,
    pub key: String,
    pub parent: Option<NodeId>,
    pub payload: T,
}

impl<T> NewNode<T> {
    pub fn new(kind: NodeKind, key: impl Into<String>, payload: T) -> Self {
        Self {
            id: None,
            kind,
            key: key.into(),
            parent: None,
            payload,
        }
    }

    pub fn under(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Id → node mapping with parent/child links.
#[derive(Debug)]
pub struct NodeRegistry<T> {
    nodes: HashMap<NodeId, NodeRecord<T>>,
    /// Ids that were registered once and must never be reused.
    retired: HashSet<NodeId>,
    next_id: u64,
}

impl<T> Default for NodeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeRegistry<T> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            retired: HashSet::new(),
            next_id: 1,
        }
    }

    /// Next id that is neither live nor retired.
    fn allocate_id(&mut self) -> NodeId {
        loop {
            let id = NodeId(self.next_id);
            self.next_id += 1;
            if !self.nodes.contains_key(&id) && !self.retired.contains(&id) {
                return id;
            }
        }
    }

    /// Register a node and link it as the active child of its parent.
    ///
    /// Validation happens before anything is touched: a live or retired id
    /// fails with `AlreadyRegistered`, an unknown parent with `NotFound`.
    pub fn register(&mut self, node: NewNode<T>) -> Result<NodeId> {
        if let Some(id) = node.id {
            if self.nodes.contains_key(&id) || self.retired.contains(&id) {
                return Err(NavError::AlreadyRegistered(id));
            }
        }
        if let Some(parent) = node.parent {
            if !self.nodes.contains_key(&parent) {
                return Err(NavError::NotFound(parent));
            }
        }

        let id = match node.id {
            Some(id) => id,
            None => self.allocate_id(),
        };

        self.nodes.insert(
            id,
            NodeRecord {
                id,
                kind: node.kind,
                key: node.key,
                parent: None,
                children: Vec::new(),
                active: false,
                phase: NodePhase::Unregistered,
                payload: node.payload,
            },
        );

        if let Some(parent) = node.parent {
            self.add_child(parent, id)?;
        }

        Ok(id)
    }

    /// Remove a node and retire its id.
    ///
    /// The node is detached from its parent (promoting a sibling to active
    /// if needed). Its children stay registered with no parent.
    pub fn unregister(&mut self, id: NodeId) -> Result<T> {
        let parent = self.nodes.get(&id).ok_or(NavError::NotFound(id))?.parent;

        if let Some(parent) = parent {
            self.remove_child(parent, id)?;
        }

        let record = self.nodes.remove(&id).ok_or(NavError::NotFound(id))?;
        for child in &record.children {
            if let Some(child) = self.nodes.get_mut(child) {
                child.parent = None;
                child.active = false;
            }
        }

        self.retired.insert(id);
        Ok(record.payload)
    }

    // =========================================================================
    // Children & Active Flag
    // =========================================================================

    /// Append `child` to `parent`'s children and make it the sole active child.
    ///
    /// A child already linked elsewhere is moved. Re-adding an existing child
    /// only re-activates it.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if parent == child || !self.nodes.contains_key(&parent) {
            return Err(NavError::NotFound(parent));
        }
        let previous = self.nodes.get(&child).ok_or(NavError::NotFound(child))?.parent;

        if let Some(previous) = previous.filter(|&p| p != parent) {
            self.remove_child(previous, child)?;
        }

        if let Some(record) = self.nodes.get_mut(&parent) {
            if !record.children.contains(&child) {
                record.children.push(child);
            }
        }
        if let Some(record) = self.nodes.get_mut(&child) {
            record.parent = Some(parent);
        }

        self.set_active_child(parent, child)
    }

    /// Remove `child` from `parent`'s children.
    ///
    /// Removing the active child promotes the most recently added remaining
    /// child, or leaves the parent with no active child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let record = self.nodes.get_mut(&parent).ok_or(NavError::NotFound(parent))?;
        let Some(pos) = record.children.iter().position(|&c| c == child) else {
            return Err(NavError::NotFound(child));
        };
        record.children.remove(pos);
        let promote = record.children.last().copied();

        let was_active = match self.nodes.get_mut(&child) {
            Some(child) => {
                child.parent = None;
                std::mem::replace(&mut child.active, false)
            }
            None => false,
        };

        if was_active {
            if let Some(next) = promote {
                self.set_active_child(parent, next)?;
            }
        }
        Ok(())
    }

    /// Make `child` the only active child of `parent`.
    pub fn set_active_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let children = match self.nodes.get(&parent) {
            Some(record) if record.children.contains(&child) => record.children.clone(),
            Some(_) => return Err(NavError::NotFound(child)),
            None => return Err(NavError::NotFound(parent)),
        };

        for sibling in children {
            if let Some(record) = self.nodes.get_mut(&sibling) {
                record.active = sibling == child;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord<T>> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// True if `id` was registered once and has since been unregistered.
    pub fn is_retired(&self, id: NodeId) -> bool {
        self.retired.contains(&id)
    }

    pub fn phase(&self, id: NodeId) -> Option<NodePhase> {
        self.nodes.get(&id).map(|n| n.phase)
    }

    pub fn set_phase(&mut self, id: NodeId, phase: NodePhase) -> Result<()> {
        let record = self.nodes.get_mut(&id).ok_or(NavError::NotFound(id))?;
        record.phase = phase;
        Ok(())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn active_child(&self, parent: NodeId) -> Option<NodeId> {
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.active))
    }

    /// Children of `id` currently in the `Open` phase.
    pub fn open_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|c| self.phase(*c) == Some(NodePhase::Open))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of ancestors of `id` (0 for a root).
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    /// All live ids, sorted.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> NodeRegistry<()> {
        NodeRegistry::new()
    }

    fn scene(registry: &mut NodeRegistry<()>) -> NodeId {
        registry
            .register(NewNode::new(NodeKind::Scene, "Scene", ()))
            .unwrap()
    }

    fn screen_under(registry: &mut NodeRegistry<()>, parent: NodeId, key: &str) -> NodeId {
        registry
            .register(NewNode::new(NodeKind::Screen, key, ()).under(parent))
            .unwrap()
    }

    #[test]
    fn test_register_allocates_ids() {
        let mut registry = setup();

        let a = scene(&mut registry);
        let b = scene(&mut registry);

        assert_eq!(a, NodeId::from_raw(1));
        assert_eq!(b, NodeId::from_raw(2));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.phase(a), Some(NodePhase::Unregistered));
    }

    #[test]
    fn test_explicit_id_collision() {
        let mut registry = setup();
        let id = NodeId::from_raw(42);

        registry
            .register(NewNode::new(NodeKind::Scene, "A", ()).with_id(id))
            .unwrap();
        let err = registry
            .register(NewNode::new(NodeKind::Scene, "B", ()).with_id(id))
            .unwrap_err();

        assert_eq!(err, NavError::AlreadyRegistered(id));
        assert_eq!(registry.get(id).unwrap().key(), "A");
    }

    #[test]
    fn test_retired_ids_are_never_reused() {
        let mut registry = setup();

        let a = scene(&mut registry);
        registry.unregister(a).unwrap();
        assert!(registry.is_retired(a));

        let err = registry
            .register(NewNode::new(NodeKind::Scene, "again", ()).with_id(a))
            .unwrap_err();
        assert_eq!(err, NavError::AlreadyRegistered(a));

        // Allocation skips explicitly claimed ids too
        registry
            .register(NewNode::new(NodeKind::Scene, "x", ()).with_id(NodeId::from_raw(2)))
            .unwrap();
        assert_eq!(scene(&mut registry), NodeId::from_raw(3));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let mut registry = setup();
        let err = registry
            .register(NewNode::new(NodeKind::Screen, "orphan", ()).under(NodeId::from_raw(9)))
            .unwrap_err();
        assert_eq!(err, NavError::NotFound(NodeId::from_raw(9)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_newest_child_is_active() {
        let mut registry = setup();
        let root = scene(&mut registry);

        let a = screen_under(&mut registry, root, "A");
        assert_eq!(registry.active_child(root), Some(a));

        let b = screen_under(&mut registry, root, "B");
        assert_eq!(registry.active_child(root), Some(b));
        assert!(!registry.get(a).unwrap().is_active());
        assert_eq!(registry.children(root), vec![a, b]);
        assert_eq!(registry.parent(b), Some(root));
    }

    #[test]
    fn test_removing_active_child_promotes_last() {
        let mut registry = setup();
        let root = scene(&mut registry);
        let a = screen_under(&mut registry, root, "A");
        let b = screen_under(&mut registry, root, "B");
        let c = screen_under(&mut registry, root, "C");

        registry.remove_child(root, c).unwrap();
        assert_eq!(registry.active_child(root), Some(b));

        // Removing a non-active child keeps the active one
        registry.remove_child(root, a).unwrap();
        assert_eq!(registry.active_child(root), Some(b));

        registry.remove_child(root, b).unwrap();
        assert_eq!(registry.active_child(root), None);
    }

    #[test]
    fn test_set_active_child() {
        let mut registry = setup();
        let root = scene(&mut registry);
        let a = screen_under(&mut registry, root, "A");
        let _b = screen_under(&mut registry, root, "B");

        registry.set_active_child(root, a).unwrap();
        assert_eq!(registry.active_child(root), Some(a));

        let stranger = scene(&mut registry);
        assert!(registry.set_active_child(root, stranger).is_err());
    }

    #[test]
    fn test_unregister_orphans_children() {
        let mut registry = setup();
        let root = scene(&mut registry);
        let a = screen_under(&mut registry, root, "A");

        registry.unregister(root).unwrap();

        assert!(!registry.contains(root));
        assert!(registry.contains(a));
        assert_eq!(registry.parent(a), None);
    }

    #[test]
    fn test_unregister_detaches_from_parent() {
        let mut registry = setup();
        let root = scene(&mut registry);
        let a = screen_under(&mut registry, root, "A");
        let b = screen_under(&mut registry, root, "B");

        registry.unregister(b).unwrap();
        assert_eq!(registry.children(root), vec![a]);
        assert_eq!(registry.active_child(root), Some(a));

        assert_eq!(registry.unregister(b), Err(NavError::NotFound(b)));
    }

    #[test]
    fn test_add_child_moves_between_parents() {
        let mut registry = setup();
        let left = scene(&mut registry);
        let right = scene(&mut registry);
        let a = screen_under(&mut registry, left, "A");

        registry.add_child(right, a).unwrap();

        assert!(registry.children(left).is_empty());
        assert_eq!(registry.children(right), vec![a]);
        assert_eq!(registry.parent(a), Some(right));
        assert_eq!(registry.active_child(right), Some(a));
    }

    #[test]
    fn test_open_children_and_depth() {
        let mut registry = setup();
        let root = scene(&mut registry);
        let window = registry
            .register(NewNode::new(NodeKind::Window, "W", ()).under(root))
            .unwrap();
        let a = screen_under(&mut registry, window, "A");
        let b = screen_under(&mut registry, window, "B");

        registry.set_phase(a, NodePhase::Open).unwrap();
        registry.set_phase(b, NodePhase::Initializing).unwrap();

        assert_eq!(registry.open_children(window), vec![a]);
        assert_eq!(registry.depth(root), 0);
        assert_eq!(registry.depth(a), 2);
    }
}
