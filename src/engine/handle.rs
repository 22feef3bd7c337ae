//! Node handles - Stable identity of a component across generations.
//!
//! Work nodes are replaced on every render; a [`NodeHandle`] is created once
//! per logical node and carried into each new generation. It always knows
//! which arena slot is current, so imperative updates and dispatchers made
//! during an old render still find the node.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::pipeline::Lane;

use super::arena::NodeId;

/// Receiver of update requests (the owning root).
pub(crate) trait UpdateSink {
    fn schedule_update(&self, handle: &NodeHandle);
}

struct HandleInner {
    name: &'static str,
    current: Cell<Option<NodeId>>,
    /// One bit per lane with an update task already queued.
    queued: Cell<u8>,
    sink: Weak<dyn UpdateSink>,
}

/// Stable, clonable identity of one logical node.
#[derive(Clone)]
pub struct NodeHandle(Rc<HandleInner>);

impl NodeHandle {
    pub(crate) fn new(sink: Weak<dyn UpdateSink>, name: &'static str) -> Self {
        Self(Rc::new(HandleInner {
            name,
            current: Cell::new(None),
            queued: Cell::new(0),
            sink,
        }))
    }

    /// Schedule a re-render of this node.
    ///
    /// Requests made while an update is already queued on the same lane are
    /// coalesced. No-op once the root is gone.
    pub fn request_update(&self) {
        if let Some(sink) = self.0.sink.upgrade() {
            sink.schedule_update(self);
        }
    }

    /// Whether the node is part of the committed tree.
    pub fn is_mounted(&self) -> bool {
        self.0.current.get().is_some()
    }

    /// Component name, or the node kind for non-component nodes.
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    pub fn same(&self, other: &NodeHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn current(&self) -> Option<NodeId> {
        self.0.current.get()
    }

    pub(crate) fn set_current(&self, id: Option<NodeId>) {
        self.0.current.set(id);
    }

    /// Mark an update as queued on `lane`. Returns `false` if one already was.
    pub(crate) fn mark_queued(&self, lane: Lane) -> bool {
        let bits = self.0.queued.get();
        if bits & lane.bit() != 0 {
            return false;
        }
        self.0.queued.set(bits | lane.bit());
        true
    }

    pub(crate) fn clear_queued(&self, lane: Lane) {
        self.0.queued.set(self.0.queued.get() & !lane.bit());
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.0.name)
            .field("current", &self.0.current.get())
            .finish()
    }
}
