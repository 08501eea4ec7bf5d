//! Visibility Stack - Front-to-back order of open nodes.
//!
//! Index 0 is the front-most node: it holds focus and gets the highest
//! input priority. The stack itself only keeps order; the manager fires the
//! focus callbacks using what `push` and `remove` report:
//!
//! - `push` returns the node that lost the front (it gets `on_close_in`)
//! - `remove` reports the node that regained the front (it gets `on_open_out`)
//! - `bring_to_front` reorders without any callbacks
//!
//! After every mutation [`VisibilityStack::entries`] yields dense orders
//! (0 = front) for the renderer and input router.

use crate::registry::NodeId;

/// One row of the ordering output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackEntry {
    pub node: NodeId,
    /// 0 = front-most. Dense and contiguous.
    pub order: usize,
}

/// What changed when an entry was removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Removal {
    /// Position the entry had before removal.
    pub position: usize,
    /// The entry now at the front, if the removed one was the front.
    pub new_front: Option<NodeId>,
}

impl Removal {
    pub fn was_front(&self) -> bool {
        self.position == 0
    }
}

/// Ordered list of visible nodes, front first.
#[derive(Clone, Debug, Default)]
pub struct VisibilityStack {
    entries: Vec<NodeId>,
}

impl VisibilityStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `node` at the front. Returns the node previously at the front.
    ///
    /// A node already on the stack is moved instead of duplicated.
    pub fn push(&mut self, node: NodeId) -> Option<NodeId> {
        let previous = self.front().filter(|&front| front != node);
        self.entries.retain(|&n| n != node);
        self.entries.insert(0, node);
        previous
    }

    /// Remove `node` from anywhere in the stack.
    pub fn remove(&mut self, node: NodeId) -> Option<Removal> {
        let position = self.position(node)?;
        self.entries.remove(position);

        let new_front = if position == 0 { self.front() } else { None };
        Some(Removal {
            position,
            new_front,
        })
    }

    /// Move an entry to the front. Returns false if `node` is not on the stack.
    pub fn bring_to_front(&mut self, node: NodeId) -> bool {
        match self.position(node) {
            Some(0) => true,
            Some(position) => {
                self.entries.remove(position);
                self.entries.insert(0, node);
                true
            }
            None => false,
        }
    }

    pub fn front(&self) -> Option<NodeId> {
        self.entries.first().copied()
    }

    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.entries.iter().position(|&n| n == node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains(&node)
    }

    /// Node ids front to back.
    pub fn ids(&self) -> Vec<NodeId> {
        self.entries.clone()
    }

    /// Ordering output: every entry with its dense order.
    pub fn entries(&self) -> Vec<StackEntry> {
        self.entries
            .iter()
            .enumerate()
            .map(|(order, &node)| StackEntry { node, order })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn test_initial_state() {
        let stack = VisibilityStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.front(), None);
        assert!(stack.entries().is_empty());
    }

    #[test]
    fn test_push_reports_previous_front() {
        let mut stack = VisibilityStack::new();

        assert_eq!(stack.push(id(1)), None);
        assert_eq!(stack.push(id(2)), Some(id(1)));
        assert_eq!(stack.push(id(3)), Some(id(2)));

        assert_eq!(stack.ids(), vec![id(3), id(2), id(1)]);
    }

    #[test]
    fn test_push_existing_moves_it() {
        let mut stack = VisibilityStack::new();
        stack.push(id(1));
        stack.push(id(2));

        assert_eq!(stack.push(id(1)), Some(id(2)));
        assert_eq!(stack.ids(), vec![id(1), id(2)]);
        assert_eq!(stack.push(id(1)), None);
    }

    #[test]
    fn test_remove_front_reveals_next() {
        let mut stack = VisibilityStack::new();
        stack.push(id(1));
        stack.push(id(2));

        let removal = stack.remove(id(2)).unwrap();
        assert!(removal.was_front());
        assert_eq!(removal.new_front, Some(id(1)));
        assert_eq!(stack.front(), Some(id(1)));
    }

    #[test]
    fn test_remove_covered_entry() {
        let mut stack = VisibilityStack::new();
        stack.push(id(1));
        stack.push(id(2));
        stack.push(id(3));

        let removal = stack.remove(id(2)).unwrap();
        assert!(!removal.was_front());
        assert_eq!(removal.new_front, None);
        assert_eq!(stack.ids(), vec![id(3), id(1)]);

        assert_eq!(stack.remove(id(2)), None);
    }

    #[test]
    fn test_remove_last_entry() {
        let mut stack = VisibilityStack::new();
        stack.push(id(1));
        let removal = stack.remove(id(1)).unwrap();
        assert!(removal.was_front());
        assert_eq!(removal.new_front, None);
    }

    #[test]
    fn test_bring_to_front() {
        let mut stack = VisibilityStack::new();
        stack.push(id(1));
        stack.push(id(2));
        stack.push(id(3));

        assert!(stack.bring_to_front(id(1)));
        assert_eq!(stack.ids(), vec![id(1), id(3), id(2)]);

        assert!(stack.bring_to_front(id(1)));
        assert_eq!(stack.ids(), vec![id(1), id(3), id(2)]);

        assert!(!stack.bring_to_front(id(9)));
    }

    #[test]
    fn test_dense_ordering() {
        let mut stack = VisibilityStack::new();
        stack.push(id(1));
        stack.push(id(2));
        stack.push(id(3));
        stack.remove(id(2));

        let entries = stack.entries();
        assert_eq!(
            entries,
            vec![
                StackEntry { node: id(3), order: 0 },
                StackEntry { node: id(1), order: 1 },
            ]
        );
    }
}
