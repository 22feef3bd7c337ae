//! Mount API - Roots bound to a host container.
//!
//! A [`Root`] owns the committed tree for one container. Rendering only
//! schedules work; nothing reaches the host until the scheduler runs.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::{create_root, Element, MemoryContainer, MemoryHost, Scheduler};
//!
//! let scheduler = Scheduler::default();
//! let root = create_root(MemoryHost::new(), MemoryContainer::new(), &scheduler);
//!
//! root.act(|| root.render(Element::host("div").child("hello")))??;
//! root.with_host(|_, container| assert_eq!(container.children.len(), 1));
//! ```

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::engine::NodeHandle;
use crate::error::{ReconcileError, Result};
use crate::primitives::Element;
use crate::renderer::HostConfig;

use super::scheduler::Scheduler;
use super::work_loop::RootShared;

// =============================================================================
// Root
// =============================================================================

/// Handle to a mounted tree.
pub struct Root<H: HostConfig + 'static> {
    shared: Rc<RootShared<H>>,
    unmounted: Cell<bool>,
}

/// Bind `container` to a new root rendering through `host`.
pub fn create_root<H: HostConfig + 'static>(host: H, container: H::Container, scheduler: &Scheduler) -> Root<H> {
    debug!("root created");
    Root {
        shared: RootShared::new(host, container, scheduler.clone()),
        unmounted: Cell::new(false),
    }
}

impl<H: HostConfig + 'static> Root<H> {
    /// Schedule a full render of `element`.
    ///
    /// An unfinished render of this root is abandoned when the new one starts.
    pub fn render(&self, element: impl Into<Element>) -> Result<()> {
        if self.unmounted.get() {
            warn!("render called on an unmounted root");
            return Err(ReconcileError::RootUnmounted);
        }
        self.shared.schedule_render(element.into());
        Ok(())
    }

    /// Schedule removal of the whole tree. Later renders fail.
    pub fn unmount(&self) {
        if self.unmounted.replace(true) {
            return;
        }
        debug!("root unmount scheduled");
        self.shared.schedule_render(Element::Empty);
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    /// Run `f`, then drain all work it produced. See [`Scheduler::act`].
    pub fn act<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        self.shared.scheduler.act(f)
    }

    /// Inspect the host adapter and container.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a render or commit of this root.
    pub fn with_host<R>(&self, f: impl FnOnce(&H, &H::Container) -> R) -> R {
        let state = self.shared.state.borrow();
        f(&state.host, &state.container)
    }

    /// Schedule a re-render of the node behind `handle`.
    pub fn request_update(&self, handle: &NodeHandle) {
        handle.request_update();
    }

    /// Handle of the root node; updating it re-renders the last element.
    pub fn root_handle(&self) -> NodeHandle {
        self.shared.state.borrow().root_handle()
    }

    /// Number of completed commits.
    pub fn commit_count(&self) -> u64 {
        self.shared.state.borrow().commits
    }

    /// Number of live work nodes, including an unfinished render.
    pub fn node_count(&self) -> usize {
        self.shared.state.borrow().arena.len()
    }

    /// Number of pending handles with a registered retry.
    pub fn suspended_count(&self) -> usize {
        self.shared.state.borrow().suspended.len()
    }

    /// Whether a render has started but not committed.
    pub fn is_rendering(&self) -> bool {
        self.shared.state.borrow().cycle.is_some()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.scheduler.is_idle() && !self.is_rendering()
    }
}

impl<H: HostConfig + 'static> std::fmt::Debug for Root<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("unmounted", &self.unmounted.get())
            .field("scheduler", &self.shared.scheduler)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Test support
// =============================================================================

/// Root over a fresh [`MemoryHost`], plus the host's call log.
#[cfg(test)]
pub(crate) fn test_root() -> (Root<crate::renderer::MemoryHost>, crate::renderer::HostLog) {
    let host = crate::renderer::MemoryHost::new();
    let log = host.log();
    let root = create_root(host, crate::renderer::MemoryContainer::new(), &Scheduler::default());
    (root, log)
}

/// Render `element` and drain all resulting work.
#[cfg(test)]
pub(crate) fn render_now<H: HostConfig + 'static>(root: &Root<H>, element: impl Into<Element>) {
    let element = element.into();
    root.act(|| root.render(element)).unwrap().unwrap();
}

/// Value of every top-level text instance, in container order.
#[cfg(test)]
pub(crate) fn container_texts(root: &Root<crate::renderer::MemoryHost>) -> Vec<String> {
    root.with_host(|_, container| {
        container
            .snapshot()
            .iter()
            .filter_map(|node| node.props.get("value").and_then(|v| v.as_str()).map(String::from))
            .collect()
    })
}
