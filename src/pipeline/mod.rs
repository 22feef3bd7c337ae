//! Pipeline - From a requested update to a committed host tree.
//!
//! # Pipeline Architecture
//!
//! ```text
//! request_update → Scheduler → work loop → diff → commit → effects
//! ```
//!
//! ## Data Flow
//!
//! 1. **scheduler** - Queues tasks on two lanes and runs them under a deadline
//! 2. **work_loop** - Walks the work-in-progress tree one node at a time and
//!    yields when the deadline expires
//! 3. **diff** - Matches new child elements against committed nodes
//! 4. **commit** - Applies the collected changes to the host in one pass
//!
//! ## Key Design Principles
//!
//! - **Interruptible render**: nothing is visible until a cycle commits
//! - **Atomic commit**: the commit never yields
//! - **No user code under borrow**: components, effects and refs always run
//!   with the root state released

mod commit;
mod diff;
pub mod mount;
pub mod scheduler;
mod work_loop;

pub use mount::{create_root, Root};
pub use scheduler::{
    Deadline, FrameDeadline, Lane, Scheduler, SchedulerConfig, Task, Unbounded, UnitBudget,
};
