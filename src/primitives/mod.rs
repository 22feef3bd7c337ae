//! Primitives - Element descriptions and component building blocks.
//!
//! This module provides what application code hands to the engine:
//! - [`Element`] - declarative description of a subtree
//! - [`Component`] - function component with hook access
//! - [`Props`] / [`NodeRef`] - per-element payload and ref attachment
//! - [`Pending`] - explicit suspension handle
//!
//! # Architecture
//!
//! Elements never reach the host directly. Each render produces a fresh
//! element tree; the diff engine compares it to the committed work nodes and
//! only the difference is applied.

mod element;
mod pending;
mod types;

pub use element::{normalize_children, Element, ElementNode};
pub use pending::{pending, Pending, Resolver};
pub use types::*;
