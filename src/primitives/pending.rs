//! Pending handles - Explicit suspension.
//!
//! A component that cannot render yet returns `Err(Thrown::Pending(handle))`
//! (usually via `handle.suspend()?`). The work loop renders the nearest
//! suspense fallback and re-schedules the boundary once the paired
//! [`Resolver`] fires.
//!
//! ```ignore
//! let (pending, resolver) = pending();
//! let view = Component::new("Lazy", move |_| {
//!     pending.suspend()?;
//!     Ok(Element::host("ready"))
//! });
//! // later, from outside the render
//! resolver.resolve();
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Thrown;

static NEXT_PENDING_ID: AtomicU64 = AtomicU64::new(1);

struct PendingInner {
    id: u64,
    resolved: Cell<bool>,
    waiters: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Awaitable handle a component suspends on.
#[derive(Clone)]
pub struct Pending(Rc<PendingInner>);

/// Resolving half of a [`Pending`] handle.
pub struct Resolver(Rc<PendingInner>);

/// Create a connected pending/resolver pair.
pub fn pending() -> (Pending, Resolver) {
    let inner = Rc::new(PendingInner {
        id: NEXT_PENDING_ID.fetch_add(1, Ordering::Relaxed),
        resolved: Cell::new(false),
        waiters: RefCell::new(Vec::new()),
    });
    (Pending(inner.clone()), Resolver(inner))
}

impl Pending {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn is_resolved(&self) -> bool {
        self.0.resolved.get()
    }

    /// `Ok(())` once resolved, otherwise suspend the calling component.
    pub fn suspend(&self) -> Result<(), Thrown> {
        if self.is_resolved() {
            Ok(())
        } else {
            Err(Thrown::Pending(self.clone()))
        }
    }

    /// Run `callback` on resolution (immediately if already resolved).
    pub fn on_resolve(&self, callback: impl FnOnce() + 'static) {
        if self.is_resolved() {
            callback();
        } else {
            self.0.waiters.borrow_mut().push(Box::new(callback));
        }
    }
}

impl Resolver {
    /// Mark the handle resolved and notify every waiter in registration order.
    pub fn resolve(self) {
        self.0.resolved.set(true);
        let waiters = std::mem::take(&mut *self.0.waiters.borrow_mut());
        for waiter in waiters {
            waiter();
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("id", &self.0.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspend_until_resolved() {
        let (pending, resolver) = pending();
        assert!(matches!(pending.suspend(), Err(Thrown::Pending(_))));
        resolver.resolve();
        assert!(pending.suspend().is_ok());
    }

    #[test]
    fn test_waiters_run_in_order() {
        let (pending, resolver) = pending();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            pending.on_resolve(move || log.borrow_mut().push(i));
        }
        assert!(log.borrow().is_empty());
        resolver.resolve();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_on_resolve_after_resolution_runs_now() {
        let (pending, resolver) = pending();
        resolver.resolve();
        let hit = Rc::new(Cell::new(false));
        let hit_clone = hit.clone();
        pending.on_resolve(move || hit_clone.set(true));
        assert!(hit.get());
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = pending();
        let (b, _) = pending();
        assert_ne!(a.id(), b.id());
    }
}
