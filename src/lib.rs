//! # spark-reconciler
//!
//! Incremental tree reconciliation runtime for declarative UIs.
//!
//! Application code describes the UI as a tree of [`Element`]s produced by
//! function components. The runtime keeps a persistent tree of work nodes,
//! diffs every new description against it, and applies the minimal set of
//! changes to a pluggable host through the [`HostConfig`] contract.
//!
//! ## Architecture
//!
//! ```text
//! Element tree → work loop (interruptible) → diff → commit (atomic) → host
//!                    ↑                                    │
//!                    └──── hooks / state updates ←── effects
//! ```
//!
//! - Rendering is split into units of work that yield to a [`Deadline`]
//! - Committing applies all host mutations at once, then runs effects
//! - Components keep local state in positional hook slots
//!
//! ## Modules
//!
//! - [`types`] - Shared value, key and flag types
//! - [`primitives`] - Elements, components, refs, suspension handles
//! - [`hooks`] - State, memo, effect, context and scheduling hooks
//! - [`engine`] - Work-node arena and node identity
//! - [`pipeline`] - Scheduler, work loop, diff and commit
//! - [`renderer`] - Host adapter contract and the in-memory host
//!
//! ## Example
//!
//! ```ignore
//! use spark_reconciler::*;
//!
//! let counter = Component::new("Counter", |_| {
//!     let (count, set_count) = use_state(|| 0i64);
//!     use_effect(move || { set_count.set(1); None }, deps![]);
//!     Ok(Element::host("span").child(count))
//! });
//!
//! let scheduler = Scheduler::default();
//! let root = create_root(MemoryHost::new(), MemoryContainer::new(), &scheduler);
//! root.act(|| root.render(Element::component(&counter, Props::new())))??;
//! ```

pub mod engine;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod primitives;
pub mod renderer;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use error::{ComponentError, HostError, ReconcileError, Thrown};

pub use engine::{NodeHandle, NodeId};

pub use hooks::{
    // State
    use_force_update, use_node_handle, use_reducer, use_state, Dispatch, ForceUpdate, SetState, StateAction,
    // Memo
    use_callback, use_id, use_memo, use_ref, use_ref_object,
    // Effects
    use_effect, use_imperative_handle, use_insertion_effect, use_layout_effect,
    // Context
    use_context, Context,
    // Scheduling
    use_deferred_value, use_sync_external_store, use_transition, ExternalStore, StartTransition,
    is_rendering,
};

pub use pipeline::{
    create_root, Deadline, FrameDeadline, Lane, Root, Scheduler, SchedulerConfig, Task, Unbounded, UnitBudget,
};

pub use primitives::{
    pending, BoundaryConfig, Cleanup, Component, ComponentResult, Element, NodeRef, Pending, Props,
    PublicInstance, RefObject, Resolver,
};

pub use renderer::{HostConfig, HostLog, HostOp, HostResult, HostSnapshot, MemoryContainer, MemoryHost, MemoryInstance};
