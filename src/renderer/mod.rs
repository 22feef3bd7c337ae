//! Renderers - Host adapters the commit engine drives.
//!
//! - [`HostConfig`] - the contract every backend implements
//! - [`MemoryHost`] - in-memory backend with a call log

mod host;
pub mod memory;

pub use host::{HostConfig, HostResult};
pub use memory::{HostLog, HostOp, HostSnapshot, MemoryContainer, MemoryHost, MemoryInstance};
