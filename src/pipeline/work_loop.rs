//! Work loop - Cooperative, interruptible render traversal.
//!
//! A render cycle clones one committed node (the root for a full render, the
//! owner of a state change for a local update) and walks the subtree below it
//! in pre-order, one unit of work per node:
//! - host and text nodes get their host instance if they have none yet
//! - component nodes run through the hook machine
//! - every node's children are reconciled by the diff engine
//!
//! After each unit the deadline is checked. When it expires the loop stores
//! its cursor and re-queues itself, so only a fully walked tree ever reaches
//! the commit engine. A newer full render abandons an unfinished cycle and
//! frees everything it allocated.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::engine::{NodeArena, NodeHandle, NodeId, NodeKind, UpdateSink, WorkNode};
use crate::error::{ComponentError, ReconcileError, Result, Thrown};
use crate::hooks::frame::{render_with_hooks, ContextSource, RenderFrame};
use crate::primitives::{normalize_children, BoundaryConfig, ContextId, Element, Pending, Props};
use crate::renderer::HostConfig;

use super::commit::{commit_root, EffectRun};
use super::diff::reconcile_children;
use super::scheduler::{Deadline, Lane, Scheduler, Task};

// =============================================================================
// Root State
// =============================================================================

/// One in-flight render.
pub(crate) struct RenderCycle {
    pub(crate) id: u64,
    pub(crate) lane: Lane,
    /// Work-in-progress node bounding the traversal.
    pub(crate) root: NodeId,
    /// Committed node `root` replaces.
    pub(crate) replaces: NodeId,
    pub(crate) next_unit: Option<NodeId>,
}

/// Everything a root owns. Borrowed mutably by the loop, never across a
/// component call.
pub(crate) struct RootState<H: HostConfig> {
    pub(crate) arena: NodeArena<H>,
    pub(crate) host: H,
    pub(crate) container: H::Container,
    /// Committed root node.
    pub(crate) current: NodeId,
    pub(crate) cycle: Option<RenderCycle>,
    /// Old nodes the diff dropped during the current cycle.
    pub(crate) deletions: Vec<NodeId>,
    /// Errors caught by boundaries during the current cycle. Recorded on the
    /// boundary only when the cycle commits.
    pub(crate) caught: Vec<(BoundaryConfig, ComponentError, NodeHandle)>,
    /// Pending handles with a registered retry.
    pub(crate) suspended: HashSet<u64>,
    /// Updates that arrived while a cycle was in flight.
    pub(crate) blocked: Vec<(NodeHandle, Lane)>,
    pub(crate) pending_passive: Vec<EffectRun>,
    pub(crate) sink: Weak<dyn UpdateSink>,
    pub(crate) commits: u64,
    next_cycle_id: u64,
}

impl<H: HostConfig> RootState<H> {
    pub(crate) fn new(host: H, container: H::Container, sink: Weak<dyn UpdateSink>) -> Self {
        let mut arena = NodeArena::new();
        let handle = NodeHandle::new(sink.clone(), NodeKind::Root.name());
        let current = arena.insert(WorkNode::new(NodeKind::Root, None, Rc::new(Props::new()), handle.clone()));
        handle.set_current(Some(current));
        arena.begin_cycle();

        Self {
            arena,
            host,
            container,
            current,
            cycle: None,
            deletions: Vec::new(),
            caught: Vec::new(),
            suspended: HashSet::new(),
            blocked: Vec::new(),
            pending_passive: Vec::new(),
            sink,
            commits: 0,
            next_cycle_id: 0,
        }
    }

    pub(crate) fn root_handle(&self) -> NodeHandle {
        self.arena[self.current].handle.clone()
    }

    /// Start a cycle that re-renders committed node `replaces`.
    ///
    /// `element` replaces the children of a root render.
    fn begin_cycle(&mut self, replaces: NodeId, element: Option<Element>, lane: Lane) -> u64 {
        self.arena.begin_cycle();

        let old = &self.arena[replaces];
        let next_sibling = old.next_sibling;
        let mut wip = old.clone_for_update(replaces);
        wip.next_sibling = next_sibling;
        if let Some(element) = element {
            wip.props = Rc::new(Props {
                children: vec![element],
                ..Props::default()
            });
        }
        let name = wip.kind.name();
        let root = self.arena.insert(wip);

        self.next_cycle_id += 1;
        let id = self.next_cycle_id;
        self.cycle = Some(RenderCycle {
            id,
            lane,
            root,
            replaces,
            next_unit: Some(root),
        });
        debug!(cycle = id, root = name, ?lane, "render cycle started");
        id
    }

    /// Drop the in-flight cycle and everything it allocated.
    pub(crate) fn abandon_cycle(&mut self) {
        let Some(cycle) = self.cycle.take() else {
            return;
        };
        let allocated = self.arena.take_cycle_allocs();
        debug!(cycle = cycle.id, nodes = allocated.len(), "render cycle abandoned");
        for id in allocated {
            self.arena.remove(id);
        }
        self.deletions.clear();
        self.caught.clear();
    }

    /// Nearest ancestor of `id` satisfying `pred`.
    fn find_ancestor(&self, id: NodeId, pred: impl Fn(&WorkNode<H>) -> bool) -> Option<NodeId> {
        let mut cursor = self.arena.get(id)?.parent;
        while let Some(parent) = cursor {
            let node = self.arena.get(parent)?;
            if pred(node) {
                return Some(parent);
            }
            cursor = node.parent;
        }
        None
    }

    /// Create the host instance of a host or text node that has none.
    fn ensure_host_instance(&mut self, id: NodeId) -> Result<()> {
        let node = &self.arena[id];
        if node.host.is_some() {
            return Ok(());
        }
        match &node.kind {
            NodeKind::Host(ty) => {
                let (ty, props) = (ty.clone(), node.props.clone());
                let instance = self.host.create_instance(&ty, &props)?;
                let needs_mount = self.host.finalize_initial_children(&instance, &ty, &props);
                let node = &mut self.arena[id];
                node.host = Some(instance);
                node.needs_mount = needs_mount;
            }
            NodeKind::Text => {
                let text = node.text.clone();
                let instance = self.host.create_text_instance(&text)?;
                self.arena[id].host = Some(instance);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Next node in pre-order, bounded by `root`.
fn next_unit<H: HostConfig>(arena: &NodeArena<H>, unit: NodeId, root: NodeId) -> Option<NodeId> {
    if let Some(child) = arena[unit].first_child {
        return Some(child);
    }
    let mut node = unit;
    loop {
        if node == root {
            return None;
        }
        let current = &arena[node];
        if let Some(sibling) = current.next_sibling {
            return Some(sibling);
        }
        node = current.parent?;
    }
}

// =============================================================================
// Root Shared
// =============================================================================

/// What a unit of work does after the host instance step.
enum Work {
    Children(Vec<Element>),
    Component,
    Fallback(BoundaryConfig, ComponentError),
}

/// Root state plus the scheduler it runs on. Tasks hold it weakly.
pub(crate) struct RootShared<H: HostConfig + 'static> {
    pub(crate) state: RefCell<RootState<H>>,
    pub(crate) scheduler: Scheduler,
    /// Root renders queued but not started. In-flight work yields to them.
    queued_renders: Cell<usize>,
    self_ref: Weak<RootShared<H>>,
}

impl<H: HostConfig + 'static> RootShared<H> {
    pub(crate) fn new(host: H, container: H::Container, scheduler: Scheduler) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let sink: Weak<dyn UpdateSink> = weak.clone();
            Self {
                state: RefCell::new(RootState::new(host, container, sink)),
                scheduler,
                queued_renders: Cell::new(0),
                self_ref: weak.clone(),
            }
        })
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Queue a full render of `element`.
    pub(crate) fn schedule_render(&self, element: Element) {
        self.queued_renders.set(self.queued_renders.get() + 1);
        let weak = self.self_ref.clone();
        self.scheduler.schedule(
            Lane::Immediate,
            Box::new(move |deadline: &mut dyn Deadline| {
                let Some(shared) = weak.upgrade() else {
                    debug!("render for a dropped root discarded");
                    return Ok(());
                };
                shared.queued_renders.set(shared.queued_renders.get().saturating_sub(1));
                shared.flush_passive_effects();
                let cycle = shared.begin_root_render(element);
                shared.work(cycle, deadline)
            }),
        );
    }

    /// Queue a re-render of `handle`'s node on `lane`, once per lane.
    pub(crate) fn schedule_on(&self, handle: &NodeHandle, lane: Lane) {
        if !handle.mark_queued(lane) {
            return;
        }
        trace!(component = handle.name(), ?lane, "update scheduled");
        let weak = self.self_ref.clone();
        let handle = handle.clone();
        self.scheduler.schedule(
            lane,
            Box::new(move |deadline: &mut dyn Deadline| match weak.upgrade() {
                Some(shared) => shared.run_update(handle, lane, deadline),
                None => {
                    debug!(component = handle.name(), "update for a dropped root discarded");
                    Ok(())
                }
            }),
        );
    }

    fn continuation(&self, cycle: u64) -> Task {
        let weak = self.self_ref.clone();
        Box::new(move |deadline: &mut dyn Deadline| match weak.upgrade() {
            Some(shared) => shared.work(cycle, deadline),
            None => {
                debug!(cycle, "continuation for a dropped root discarded");
                Ok(())
            }
        })
    }

    fn begin_root_render(&self, element: Element) -> u64 {
        let mut state = self.state.borrow_mut();
        if state.cycle.is_some() {
            // Superseded: a root render always starts from the root
            state.abandon_cycle();
        }
        let current = state.current;
        state.begin_cycle(current, Some(element), Lane::Immediate)
    }

    fn run_update(&self, handle: NodeHandle, lane: Lane, deadline: &mut dyn Deadline) -> Result<()> {
        self.flush_passive_effects();
        let cycle = {
            let mut state = self.state.borrow_mut();
            if state.cycle.is_some() {
                // Retried after the in-flight cycle commits
                state.blocked.push((handle, lane));
                return Ok(());
            }
            handle.clear_queued(lane);
            let current = handle.current().filter(|id| state.arena.contains(*id));
            let Some(current) = current else {
                trace!(component = handle.name(), "update for unmounted node dropped");
                return Ok(());
            };
            state.begin_cycle(current, None, lane)
        };
        self.work(cycle, deadline)
    }

    /// Re-queue updates that waited for the previous cycle.
    fn release_blocked(&self) {
        let blocked = std::mem::take(&mut self.state.borrow_mut().blocked);
        for (handle, lane) in blocked {
            handle.clear_queued(lane);
            self.schedule_on(&handle, lane);
        }
    }

    fn resume(&self, pending: u64, handle: &NodeHandle) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.suspended.remove(&pending);
        }
        debug!(pending, component = handle.name(), "suspended render retried");
        self.schedule_on(handle, self.scheduler.update_lane());
    }

    // -------------------------------------------------------------------------
    // Work loop
    // -------------------------------------------------------------------------

    /// Perform units of work for cycle `cycle` until done or out of time.
    pub(crate) fn work(&self, cycle: u64, deadline: &mut dyn Deadline) -> Result<()> {
        loop {
            if self.queued_renders.get() > 0 {
                // The queued render abandons this cycle when it starts
                trace!(cycle, "render superseded");
                return Ok(());
            }
            let (unit, root, lane) = {
                let state = self.state.borrow();
                match &state.cycle {
                    Some(current) if current.id == cycle => (current.next_unit, current.root, current.lane),
                    // Superseded while queued
                    _ => return Ok(()),
                }
            };

            let Some(unit) = unit else {
                return self.commit_cycle();
            };

            let next = match self.perform_unit_of_work(unit, root) {
                Ok(next) => next,
                Err(error) => {
                    self.state.borrow_mut().abandon_cycle();
                    self.release_blocked();
                    return Err(error);
                }
            };

            {
                let mut state = self.state.borrow_mut();
                match state.cycle.as_mut() {
                    Some(current) if current.id == cycle => current.next_unit = next,
                    _ => return Ok(()),
                }
            }

            if next.is_some() && deadline.should_yield() {
                trace!(cycle, "work loop yielded");
                self.scheduler.schedule(lane, self.continuation(cycle));
                return Ok(());
            }
        }
    }

    fn perform_unit_of_work(&self, unit: NodeId, root: NodeId) -> Result<Option<NodeId>> {
        self.begin_work(unit)?;
        let state = self.state.borrow();
        Ok(next_unit(&state.arena, unit, root))
    }

    fn begin_work(&self, id: NodeId) -> Result<()> {
        let work = {
            let mut state = self.state.borrow_mut();
            state.ensure_host_instance(id)?;
            let node = &state.arena[id];
            trace!(node = node.kind.name(), ?id, "begin work");
            match &node.kind {
                NodeKind::Root | NodeKind::Host(_) | NodeKind::Provider(_) | NodeKind::Suspense(_) => {
                    Work::Children(node.props.children.clone())
                }
                NodeKind::Text => Work::Children(Vec::new()),
                NodeKind::Component(_) => Work::Component,
                NodeKind::ErrorBoundary(config) => {
                    let caught = node.caught.borrow().clone();
                    match caught {
                        Some(error) => Work::Fallback(config.clone(), error),
                        None => Work::Children(node.props.children.clone()),
                    }
                }
            }
        };

        let children = match work {
            Work::Children(children) => children,
            Work::Component => self.render_component(id)?,
            Work::Fallback(config, error) => config.fallback.as_ref().map(|fallback| fallback(&error)).into_iter().collect(),
        };

        let mut state = self.state.borrow_mut();
        reconcile_children(&mut state, id, &normalize_children(&children));
        Ok(())
    }

    /// Run a component node through the hook machine.
    fn render_component(&self, id: NodeId) -> Result<Vec<Element>> {
        let Some(shared) = self.self_ref.upgrade() else {
            return Err(ReconcileError::RootUnmounted);
        };
        let (component, props, frame) = {
            let mut state = self.state.borrow_mut();
            let node = &mut state.arena[id];
            let NodeKind::Component(component) = &node.kind else {
                return Ok(Vec::new());
            };
            let component = component.clone();
            let props = node.props.clone();
            let frame = RenderFrame::new(
                id,
                node.handle.clone(),
                self.scheduler.clone(),
                shared,
                std::mem::take(&mut node.hooks),
                std::mem::take(&mut node.effects),
            );
            (component, props, frame)
        };

        // No borrow is held while user code runs
        let output = render_with_hooks(frame, &component, &props);

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let node = &mut state.arena[id];
        match output.result {
            Ok(element) => {
                node.hooks = output.hooks;
                node.effects = output.effects;
                Ok(vec![element])
            }
            Err(thrown) => {
                // A thrown render commits none of its hook work
                node.hooks = output.previous;
                node.effects = output.previous_effects;
                match thrown {
                    Thrown::Pending(pending) if pending.is_resolved() => {
                        // Retrying would throw the same handle again
                        let error = ComponentError::new(format!(
                            "suspended on pending handle {} after it resolved",
                            pending.id()
                        ));
                        self.capture_error(state, id, component.name(), error)
                    }
                    Thrown::Pending(pending) => Ok(self.suspend(state, id, component.name(), pending)),
                    Thrown::Error(error) => self.capture_error(state, id, component.name(), error),
                }
            }
        }
    }

    /// Render the nearest suspense fallback in place of the suspended node
    /// and retry the boundary once `pending` resolves.
    fn suspend(&self, state: &mut RootState<H>, id: NodeId, name: &'static str, pending: Pending) -> Vec<Element> {
        let boundary = state.find_ancestor(id, |node| matches!(node.kind, NodeKind::Suspense(_)));
        let (fallback, retry) = match boundary.map(|boundary| &state.arena[boundary]) {
            Some(WorkNode {
                kind: NodeKind::Suspense(config),
                handle,
                ..
            }) => ((*config.fallback).clone(), handle.clone()),
            _ => (Element::Empty, state.root_handle()),
        };
        debug!(
            component = name,
            pending = pending.id(),
            boundary = boundary.is_some(),
            "render suspended"
        );

        state.suspended.insert(pending.id());
        let weak = self.self_ref.clone();
        let pending_id = pending.id();
        pending.on_resolve(move || {
            if let Some(shared) = weak.upgrade() {
                shared.resume(pending_id, &retry);
            }
        });
        vec![fallback]
    }

    /// Route a render error to the nearest error boundary that can recover.
    ///
    /// The failing node renders nothing; once the cycle commits the boundary
    /// re-renders with its fallback in a follow-up update.
    fn capture_error(
        &self,
        state: &mut RootState<H>,
        id: NodeId,
        name: &'static str,
        error: ComponentError,
    ) -> Result<Vec<Element>> {
        let caught = &state.caught;
        let boundary = state.find_ancestor(id, |node| match &node.kind {
            NodeKind::ErrorBoundary(config) => {
                config.recovers()
                    && node.caught.borrow().is_none()
                    && !caught.iter().any(|(_, _, handle)| handle.same(&node.handle))
            }
            _ => false,
        });
        let Some(boundary) = boundary else {
            return Err(ReconcileError::Render { component: name, error });
        };

        let node = &state.arena[boundary];
        let NodeKind::ErrorBoundary(config) = &node.kind else {
            return Err(ReconcileError::Render { component: name, error });
        };
        let (config, handle) = (config.clone(), node.handle.clone());

        warn!(component = name, %error, "render error caught by boundary");
        state.caught.push((config, error, handle.clone()));
        self.schedule_on(&handle, Lane::Immediate);
        Ok(Vec::new())
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    fn commit_cycle(&self) -> Result<()> {
        let committed = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            match state.cycle.take() {
                Some(cycle) => commit_root(state, &cycle),
                None => return Ok(()),
            }
        };

        let actions = match committed {
            Ok(actions) => actions,
            Err(error) => {
                self.release_blocked();
                return Err(error);
            }
        };

        let passive = actions.run();
        if !passive.is_empty() {
            self.state.borrow_mut().pending_passive.extend(passive);
            let weak = self.self_ref.clone();
            self.scheduler.schedule(
                Lane::Deferred,
                Box::new(move |_: &mut dyn Deadline| {
                    if let Some(shared) = weak.upgrade() {
                        shared.flush_passive_effects();
                    }
                    Ok(())
                }),
            );
        }
        self.release_blocked();
        Ok(())
    }

    /// Run passive effects left by the last commit.
    pub(crate) fn flush_passive_effects(&self) {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending_passive);
        if pending.is_empty() {
            return;
        }
        trace!(count = pending.len(), "flushing passive effects");
        for effect in pending {
            effect.run();
        }
    }
}

impl<H: HostConfig + 'static> UpdateSink for RootShared<H> {
    fn schedule_update(&self, handle: &NodeHandle) {
        self.schedule_on(handle, self.scheduler.update_lane());
    }
}

impl<H: HostConfig + 'static> ContextSource for RootShared<H> {
    fn read_context(&self, from: NodeId, id: ContextId) -> Option<Rc<dyn Any>> {
        let Ok(state) = self.state.try_borrow() else {
            warn!(?id, "context read while the root is borrowed, using the default value");
            return None;
        };
        let provider = state.find_ancestor(from, |node| match &node.kind {
            NodeKind::Provider(provider) => provider.id == id,
            _ => false,
        })?;
        match &state.arena[provider].kind {
            NodeKind::Provider(provider) => Some(provider.value.clone()),
            _ => None,
        }
    }
}
