//! Hooks - Persistent local state for function components.
//!
//! Every hook call claims the next slot of the rendering node. Slots are
//! matched by call position, so a component must call the same hooks in the
//! same order on every render.
//!
//! - State: [`use_state`], [`use_reducer`], [`use_force_update`]
//! - Memo: [`use_memo`], [`use_callback`], [`use_ref`], [`use_ref_object`], [`use_id`]
//! - Effects: [`use_effect`], [`use_layout_effect`], [`use_insertion_effect`],
//!   [`use_imperative_handle`]
//! - Context: [`Context`], [`use_context`]
//! - Scheduling: [`use_transition`], [`use_deferred_value`],
//!   [`use_sync_external_store`], [`use_node_handle`]

mod context;
mod effect;
pub(crate) mod frame;
mod memo;
pub(crate) mod records;
mod state;
mod transition;

pub use context::{use_context, Context};
pub use effect::{use_effect, use_imperative_handle, use_insertion_effect, use_layout_effect};
pub use frame::is_rendering;
pub use memo::{use_callback, use_id, use_memo, use_ref, use_ref_object};
pub use state::{
    use_force_update, use_node_handle, use_reducer, use_state, Dispatch, ForceUpdate, SetState, StateAction,
};
pub use transition::{use_deferred_value, use_sync_external_store, use_transition, ExternalStore, StartTransition};
