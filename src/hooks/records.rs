//! Hook records - Persistent local-state slots attached to work nodes.
//!
//! - [`Hook`] - state/reducer and memo slots, one per call, in call order
//! - [`EffectRecord`] - effect slots, kept in their own ordered list
//! - [`UpdateQueue`] - pending actions of a state hook
//!
//! Queues and effect instances are shared by reference between the current
//! and work-in-progress generation of a node, so dispatches made against an
//! older render still reach the right queue.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::primitives::Cleanup;
use crate::types::{Deps, HookFlags};

// =============================================================================
// Update Queue
// =============================================================================

pub(crate) type Reducer<S, A> = Rc<dyn Fn(&S, &A) -> S>;

/// Pending actions of one state hook, in enqueue order.
///
/// Actions are not removed while rendering: the render folds all of them and
/// records how many it consumed, and the commit drops exactly that many. An
/// abandoned render therefore never loses an action.
pub(crate) struct UpdateQueue<S, A> {
    pending: RefCell<VecDeque<A>>,
    reducer: RefCell<Reducer<S, A>>,
    last_rendered: RefCell<Rc<S>>,
}

impl<S: 'static, A: 'static> UpdateQueue<S, A> {
    pub(crate) fn new(reducer: Reducer<S, A>, initial: Rc<S>) -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
            reducer: RefCell::new(reducer),
            last_rendered: RefCell::new(initial),
        }
    }

    /// Fold every pending action over `base`.
    ///
    /// Returns the new state (or `None` if nothing is pending) and the number
    /// of actions consumed.
    pub(crate) fn fold(&self, base: &S, reducer: Reducer<S, A>) -> (Option<S>, usize) {
        *self.reducer.borrow_mut() = reducer.clone();
        let pending = self.pending.borrow();
        let mut state: Option<S> = None;
        for action in pending.iter() {
            let next = reducer(state.as_ref().unwrap_or(base), action);
            state = Some(next);
        }
        (state, pending.len())
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Typed entry point used by dispatchers.
pub(crate) trait ActionQueue<A> {
    /// Enqueue an action. Returns `false` when the eager state computed from
    /// the last rendered state proves the action is a no-op.
    fn push(&self, action: A) -> bool;
}

impl<S: PartialEq + 'static, A: 'static> ActionQueue<A> for UpdateQueue<S, A> {
    fn push(&self, action: A) -> bool {
        // Only an empty queue has a trustworthy base for the eager state
        let eager = if self.pending.borrow().is_empty() {
            let reducer = self.reducer.borrow().clone();
            let last = self.last_rendered.borrow().clone();
            Some(reducer(&last, &action) == *last)
        } else {
            None
        };
        self.pending.borrow_mut().push_back(action);
        !matches!(eager, Some(true))
    }
}

/// Type-erased queue stored in the hook chain.
pub(crate) trait ErasedQueue {
    /// Drop the `consumed` actions a committed render folded and remember the
    /// state it produced.
    fn commit(&self, consumed: usize, state: &Rc<dyn Any>);

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<S: 'static, A: 'static> ErasedQueue for UpdateQueue<S, A> {
    fn commit(&self, consumed: usize, state: &Rc<dyn Any>) {
        let mut pending = self.pending.borrow_mut();
        let consumed = consumed.min(pending.len());
        pending.drain(..consumed);
        if let Ok(state) = state.clone().downcast::<S>() {
            *self.last_rendered.borrow_mut() = state;
        }
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

// =============================================================================
// Hook
// =============================================================================

/// One state or memo slot.
#[derive(Clone)]
pub(crate) enum Hook {
    State {
        state: Rc<dyn Any>,
        queue: Rc<dyn ErasedQueue>,
        consumed: usize,
    },
    Memo {
        value: Rc<dyn Any>,
        deps: Deps,
    },
}

impl Hook {
    /// Settle a committed slot: consumed actions leave the queue.
    pub(crate) fn commit(&mut self) {
        if let Hook::State { state, queue, consumed } = self {
            queue.commit(*consumed, state);
            *consumed = 0;
        }
    }
}

// =============================================================================
// Effects
// =============================================================================

pub(crate) type EffectCreate = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Teardown storage shared by every generation of one effect slot.
#[derive(Default)]
pub(crate) struct EffectInstance {
    destroy: RefCell<Option<Cleanup>>,
}

impl EffectInstance {
    pub(crate) fn take_destroy(&self) -> Option<Cleanup> {
        self.destroy.borrow_mut().take()
    }

    pub(crate) fn set_destroy(&self, destroy: Option<Cleanup>) {
        *self.destroy.borrow_mut() = destroy;
    }

    pub(crate) fn has_destroy(&self) -> bool {
        self.destroy.borrow().is_some()
    }
}

/// One effect slot of one render generation.
pub(crate) struct EffectRecord {
    pub(crate) flags: HookFlags,
    pub(crate) create: Option<EffectCreate>,
    pub(crate) deps: Deps,
    pub(crate) inst: Rc<EffectInstance>,
}

impl EffectRecord {
    /// Copy for a new generation: same deps and teardown, nothing to run.
    pub(crate) fn carry(&self) -> EffectRecord {
        EffectRecord {
            flags: self.flags - HookFlags::HAS_EFFECT,
            create: None,
            deps: self.deps.clone(),
            inst: self.inst.clone(),
        }
    }

    pub(crate) fn kind(&self) -> HookFlags {
        self.flags & (HookFlags::INSERTION | HookFlags::LAYOUT | HookFlags::PASSIVE)
    }

    pub(crate) fn should_run(&self) -> bool {
        self.flags.contains(HookFlags::HAS_EFFECT)
    }
}
