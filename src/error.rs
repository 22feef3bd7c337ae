//! Error types.
//!
//! - [`ComponentError`] - raised by component logic while rendering
//! - [`HostError`] - raised by host adapters, never handled by the core
//! - [`ReconcileError`] - everything that can escape a flush of the scheduler

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::primitives::Pending;

/// Error raised by component logic during render.
///
/// Cheap to clone so that boundaries can keep it in their state.
#[derive(Clone)]
pub struct ComponentError {
    message: Rc<str>,
    source: Option<Rc<dyn std::error::Error>>,
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error.
    pub fn from_error(error: impl std::error::Error + 'static) -> Self {
        Self {
            message: error.to_string().into(),
            source: Some(Rc::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentError")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ComponentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref()
    }
}

/// Non-local exit from a component render.
///
/// Returned through `?` from component functions:
/// - `Pending` suspends rendering until the handle resolves
/// - `Error` is a render exception routed to the nearest error boundary
#[derive(Debug, Clone)]
pub enum Thrown {
    Pending(Pending),
    Error(ComponentError),
}

impl From<ComponentError> for Thrown {
    fn from(error: ComponentError) -> Self {
        Thrown::Error(error)
    }
}

impl From<Pending> for Thrown {
    fn from(pending: Pending) -> Self {
        Thrown::Pending(pending)
    }
}

/// Error reported by a host adapter.
#[derive(Debug, Error)]
#[error("host operation `{operation}` failed: {message}")]
pub struct HostError {
    pub operation: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Errors escaping the work loop or the commit engine.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A component error with no boundary able to recover from it.
    #[error("uncaught error while rendering `{component}`: {error}")]
    Render {
        component: &'static str,
        error: ComponentError,
    },

    #[error(transparent)]
    Host(#[from] HostError),

    /// Work was scheduled for a root that has since been dropped.
    #[error("root was dropped before its work ran")]
    RootUnmounted,
}

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
