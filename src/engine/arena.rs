//! Node arena - Slot allocation for work nodes.
//!
//! Manages the lifecycle of node slots:
//! - Generational ids, so a stale id never aliases a reused slot
//! - Free slot pool for O(1) reuse
//! - Per-cycle allocation log, so an abandoned render can be freed at once
//!
//! Tree links (`parent`, `first_child`, `next_sibling`, `alternate`) are ids
//! into this arena; the current/work-in-progress pair is just two ids.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::renderer::HostConfig;

use super::node::WorkNode;

// =============================================================================
// Node Id
// =============================================================================

/// Generational index of a work node.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

// =============================================================================
// Arena
// =============================================================================

struct Slot<H: HostConfig> {
    generation: u32,
    node: Option<WorkNode<H>>,
}

pub(crate) struct NodeArena<H: HostConfig> {
    slots: Vec<Slot<H>>,
    /// Pool of freed slot indices for reuse.
    free: Vec<u32>,
    live: usize,
    /// Nodes allocated since the current render cycle began.
    cycle_allocs: Vec<NodeId>,
}

impl<H: HostConfig> NodeArena<H> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            cycle_allocs: Vec::new(),
        }
    }

    /// Store a node, reusing a free slot when one exists.
    pub(crate) fn insert(&mut self, node: WorkNode<H>) -> NodeId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId { index, generation: 0 }
            }
        };
        self.live += 1;
        self.cycle_allocs.push(id);
        id
    }

    /// Release a slot. Stale ids are ignored.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<WorkNode<H>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&WorkNode<H>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut WorkNode<H>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Start logging allocations for a new render cycle.
    pub(crate) fn begin_cycle(&mut self) {
        self.cycle_allocs.clear();
    }

    /// Nodes allocated since [`begin_cycle`](Self::begin_cycle).
    pub(crate) fn take_cycle_allocs(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.cycle_allocs)
    }

    /// Children of `id` in sibling order.
    pub(crate) fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut child = self.get(id).and_then(|node| node.first_child);
        while let Some(current) = child {
            out.push(current);
            child = self.get(current).and_then(|node| node.next_sibling);
        }
        out
    }
}

impl<H: HostConfig> Index<NodeId> for NodeArena<H> {
    type Output = WorkNode<H>;

    fn index(&self, id: NodeId) -> &WorkNode<H> {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale node id {id:?}"),
        }
    }
}

impl<H: HostConfig> IndexMut<NodeId> for NodeArena<H> {
    fn index_mut(&mut self, id: NodeId) -> &mut WorkNode<H> {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale node id {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::{Rc, Weak};

    use crate::engine::handle::{NodeHandle, UpdateSink};
    use crate::engine::node::NodeKind;
    use crate::primitives::Props;
    use crate::renderer::MemoryHost;

    struct NoSink;

    impl UpdateSink for NoSink {
        fn schedule_update(&self, _handle: &NodeHandle) {}
    }

    fn node() -> WorkNode<MemoryHost> {
        let weak: Weak<dyn UpdateSink> = Weak::<NoSink>::new();
        WorkNode::new(
            NodeKind::Host("element".into()),
            None,
            Rc::new(Props::new()),
            NodeHandle::new(weak, "#host"),
        )
    }

    #[test]
    fn test_insert_and_remove() {
        let mut arena = NodeArena::new();
        let a = arena.insert(node());
        let b = arena.insert(node());
        assert_eq!(arena.len(), 2);
        assert!(arena.remove(a).is_some());
        assert_eq!(arena.len(), 1);
        assert!(!arena.contains(a));
        assert!(arena.contains(b));
    }

    #[test]
    fn test_reused_slot_rejects_stale_id() {
        let mut arena = NodeArena::new();
        let a = arena.insert(node());
        arena.remove(a);
        let c = arena.insert(node());
        assert_ne!(a, c);
        assert!(arena.get(a).is_none());
        assert!(arena.get(c).is_some());
        assert!(arena.remove(a).is_none());
    }

    #[test]
    fn test_cycle_allocs() {
        let mut arena = NodeArena::new();
        arena.insert(node());
        arena.begin_cycle();
        let b = arena.insert(node());
        let c = arena.insert(node());
        assert_eq!(arena.take_cycle_allocs(), vec![b, c]);
        assert!(arena.take_cycle_allocs().is_empty());
    }

    #[test]
    fn test_children_in_order() {
        let mut arena = NodeArena::new();
        let parent = arena.insert(node());
        let a = arena.insert(node());
        let b = arena.insert(node());
        arena[parent].first_child = Some(a);
        arena[a].next_sibling = Some(b);
        assert_eq!(arena.children(parent), vec![a, b]);
    }
}
