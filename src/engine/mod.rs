//! Engine - Work-node storage and identity.
//!
//! - Arena: generational slots holding every live work node
//! - WorkNode: one node of one render generation
//! - NodeHandle: stable identity across generations
//!
//! # Architecture
//!
//! Nodes are NOT linked objects. They are slots in an arena, and every tree
//! link is an id:
//!
//! ```text
//! #0v0 Root      (first_child=#1v0)
//! #1v0 Component (parent=#0v0, first_child=#2v0, alternate=None)
//! #2v0 Host      (parent=#1v0, next_sibling=#3v0)
//! #3v0 Text      (parent=#1v0)
//! ```
//!
//! A work-in-progress node points at its committed counterpart through
//! `alternate`; after the commit the old slot is freed and its id becomes
//! stale.

pub(crate) mod arena;
pub(crate) mod handle;
pub(crate) mod node;

pub use arena::NodeId;
pub use handle::NodeHandle;

pub(crate) use arena::NodeArena;
pub(crate) use handle::UpdateSink;
pub(crate) use node::{Anchor, NodeKind, WorkNode};
