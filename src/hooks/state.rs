//! State hooks - `use_reducer` and `use_state`.
//!
//! # Example
//!
//! ```ignore
//! let counter = Component::new("Counter", |_| {
//!     let (count, set_count) = use_state(|| 0);
//!     let on_click = move || set_count.update(|n| n + 1);
//!     Ok(Element::host("button").attr("count", count))
//! });
//! ```

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::engine::NodeHandle;

use super::frame::{order_violation, with_frame};
use super::records::{ActionQueue, Hook, Reducer, UpdateQueue};

// =============================================================================
// Dispatch
// =============================================================================

/// Sends actions to one state hook.
///
/// Stays valid across renders: it targets the hook's queue, which every
/// generation of the node shares.
pub struct Dispatch<A> {
    queue: Rc<dyn ActionQueue<A>>,
    handle: NodeHandle,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<A: 'static> Dispatch<A> {
    /// Enqueue `action` and schedule a re-render of the owning node.
    ///
    /// Skips scheduling when the action provably leaves the last rendered
    /// state unchanged.
    pub fn dispatch(&self, action: A) {
        if self.queue.push(action) {
            self.handle.request_update();
        } else {
            trace!(component = self.handle.name(), "dispatch bailed out eagerly");
        }
    }

    /// Node the dispatcher belongs to.
    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").field("handle", &self.handle).finish()
    }
}

/// Action of a [`use_state`] hook.
pub enum StateAction<T> {
    Replace(T),
    Update(Rc<dyn Fn(&T) -> T>),
}

/// Setter returned by [`use_state`].
pub type SetState<T> = Dispatch<StateAction<T>>;

impl<T: 'static> Dispatch<StateAction<T>> {
    pub fn set(&self, value: T) {
        self.dispatch(StateAction::Replace(value));
    }

    /// Derive the next state from the previous one.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.dispatch(StateAction::Update(Rc::new(f)));
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Reducer-backed local state.
///
/// On mount, `init` produces the initial state. On every later render all
/// actions dispatched since the last commit are folded through `reducer` in
/// dispatch order.
pub fn use_reducer<S, A>(
    reducer: impl Fn(&S, &A) -> S + 'static,
    init: impl FnOnce() -> S,
) -> (S, Dispatch<A>)
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    let reducer: Reducer<S, A> = Rc::new(reducer);
    let (previous, handle) = with_frame(|frame| (frame.previous_hook("use_reducer"), frame.handle.clone()));

    let (state, queue, consumed) = match previous {
        None => {
            let initial = Rc::new(init());
            let queue = Rc::new(UpdateQueue::new(reducer, initial.clone()));
            (initial, queue, 0)
        }
        Some(Hook::State { state, queue, .. }) => {
            let state = state
                .downcast::<S>()
                .unwrap_or_else(|_| order_violation("use_reducer"));
            let queue = queue
                .into_any()
                .downcast::<UpdateQueue<S, A>>()
                .unwrap_or_else(|_| order_violation("use_reducer"));
            let (next, consumed) = queue.fold(&state, reducer);
            (next.map(Rc::new).unwrap_or(state), queue, consumed)
        }
        Some(Hook::Memo { .. }) => order_violation("use_reducer"),
    };

    with_frame(|frame| {
        frame.push_hook(Hook::State {
            state: state.clone(),
            queue: queue.clone(),
            consumed,
        })
    });

    let value = (*state).clone();
    (value, Dispatch { queue, handle })
}

fn apply_state_action<T: Clone>(state: &T, action: &StateAction<T>) -> T {
    match action {
        StateAction::Replace(value) => value.clone(),
        StateAction::Update(f) => f(state),
    }
}

/// Local state with a replace-or-update setter.
pub fn use_state<T>(init: impl FnOnce() -> T) -> (T, SetState<T>)
where
    T: Clone + PartialEq + 'static,
{
    use_reducer(apply_state_action::<T>, init)
}

/// Handle that re-renders the calling component on demand.
#[derive(Clone, Debug)]
pub struct ForceUpdate(Dispatch<()>);

impl ForceUpdate {
    pub fn trigger(&self) {
        self.0.dispatch(());
    }
}

pub fn use_force_update() -> ForceUpdate {
    // Every action yields a new count, so the eager check never skips it
    let (_, dispatch) = use_reducer(|count: &u64, _: &()| count.wrapping_add(1), || 0);
    ForceUpdate(dispatch)
}

/// Stable handle of the calling component, for imperative updates.
pub fn use_node_handle() -> NodeHandle {
    with_frame(|frame| frame.handle.clone())
}
