//! Ownership Edges
//!
//! This module defines node identity and the reverse (child → parent) side of
//! the ownership graph.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use indexmap::{IndexMap, IndexSet};

use crate::reactive::{Key, NodeCell, Reactive};

/// Unique identifier for a node in the ownership graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// All keys under which one parent holds this node.
///
/// The parent is held weakly: parents own their children, never the other
/// way round, so a tree without external handles is freed from the top.
struct ParentEdge {
    parent: Weak<NodeCell>,
    keys: IndexSet<Key>,
}

/// The parents of a node, in the order they first adopted it.
#[derive(Default)]
pub(crate) struct Parents {
    edges: IndexMap<NodeId, ParentEdge>,
}

impl Parents {
    /// Record that `parent` holds this node under `key`.
    pub(crate) fn add(&mut self, parent: &Reactive, key: Key) {
        self.edges
            .entry(parent.id())
            .or_insert_with(|| ParentEdge {
                parent: parent.downgrade(),
                keys: IndexSet::new(),
            })
            .keys
            .insert(key);
    }

    /// Forget the single `(parent, key)` edge. The parent entry goes away
    /// with its last key. Returns whether the edge existed.
    pub(crate) fn remove(&mut self, parent: NodeId, key: &Key) -> bool {
        let Some(edge) = self.edges.get_mut(&parent) else {
            return false;
        };
        let removed = edge.keys.shift_remove(key);
        if edge.keys.is_empty() {
            self.edges.shift_remove(&parent);
        }
        removed
    }

    /// Keys under which `parent` holds this node.
    pub(crate) fn keys_for(&self, parent: NodeId) -> Vec<Key> {
        self.edges
            .get(&parent)
            .map(|edge| edge.keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct parents.
    pub(crate) fn len(&self) -> usize {
        self.edges.len()
    }

    /// Live parents with their keys, plus the IDs of parents that have
    /// been dropped since they adopted this node.
    pub(crate) fn resolve(&self) -> (Vec<(Reactive, Vec<Key>)>, Vec<NodeId>) {
        let mut live = Vec::with_capacity(self.edges.len());
        let mut dead = Vec::new();
        for (&id, edge) in &self.edges {
            match Reactive::upgrade(id, &edge.parent) {
                Some(parent) => live.push((parent, edge.keys.iter().cloned().collect())),
                None => dead.push(id),
            }
        }
        (live, dead)
    }

    pub(crate) fn prune(&mut self, dead: &[NodeId]) {
        for id in dead {
            self.edges.shift_remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn one_parent_can_hold_a_child_under_several_keys() {
        let parent = Reactive::new(Value::object::<&str, i32>([])).unwrap();
        let mut parents = Parents::default();

        parents.add(&parent, Key::from("a"));
        parents.add(&parent, Key::from("b"));

        assert_eq!(parents.len(), 1);
        assert_eq!(parents.keys_for(parent.id()), [Key::from("a"), Key::from("b")]);

        assert!(parents.remove(parent.id(), &Key::from("a")));
        assert_eq!(parents.len(), 1);
        assert!(parents.remove(parent.id(), &Key::from("b")));
        assert_eq!(parents.len(), 0);
        assert!(!parents.remove(parent.id(), &Key::from("b")));
    }

    #[test]
    fn dropped_parents_resolve_as_dead() {
        let kept = Reactive::new(Value::array::<i32>([])).unwrap();
        let dropped = Reactive::new(Value::array::<i32>([])).unwrap();
        let dropped_id = dropped.id();
        let mut parents = Parents::default();

        parents.add(&kept, Key::Index(0));
        parents.add(&dropped, Key::Index(0));
        drop(dropped);

        let (live, dead) = parents.resolve();
        assert_eq!(live.len(), 1);
        assert!(live[0].0.ptr_eq(&kept));
        assert_eq!(dead, [dropped_id]);

        parents.prune(&dead);
        assert_eq!(parents.len(), 1);
    }
}
