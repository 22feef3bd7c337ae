//! Commit engine - Apply a finished work-in-progress tree to the host.
//!
//! Runs synchronously and never yields:
//! 1. Deletions: host instances removed, teardowns collected children-first
//! 2. Mutations: pre-order walk applying placements and updates
//! 3. Completion: post-order walk collecting refs and effects
//! 4. Adoption: the new generation replaces the old one, old slots freed
//!
//! No user code runs while the root state is borrowed. Everything user-visible
//! (effect creates, teardowns, ref callbacks, boundary observers) is returned
//! as [`CommitActions`] and run by the caller afterwards.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::engine::{Anchor, NodeArena, NodeId, NodeKind};
use crate::error::{ComponentError, Result};
use crate::hooks::records::{EffectCreate, EffectInstance};
use crate::primitives::{BoundaryConfig, Cleanup, NodeRef, PublicInstance};
use crate::renderer::HostConfig;
use crate::types::{EffectTag, HookFlags};

use super::work_loop::{RenderCycle, RootState};

// =============================================================================
// Deferred Actions
// =============================================================================

/// A pending effect create, bound to the slot that stores its teardown.
pub(crate) struct EffectRun {
    inst: Rc<EffectInstance>,
    create: EffectCreate,
}

impl EffectRun {
    /// Tear down the previous run, then create.
    pub(crate) fn run(self) {
        if let Some(destroy) = self.inst.take_destroy() {
            destroy();
        }
        let destroy = (self.create)();
        self.inst.set_destroy(destroy);
    }
}

/// User-visible work produced by a commit, in execution order.
#[derive(Default)]
pub(crate) struct CommitActions {
    teardowns: Vec<Cleanup>,
    insertion: Vec<EffectRun>,
    detach: Vec<NodeRef>,
    attach: Vec<(NodeRef, Option<PublicInstance>)>,
    layout: Vec<EffectRun>,
    passive: Vec<EffectRun>,
    caught: Vec<(BoundaryConfig, ComponentError)>,
}

impl CommitActions {
    /// Run everything synchronous and hand back the passive effects.
    pub(crate) fn run(self) -> Vec<EffectRun> {
        for teardown in self.teardowns {
            teardown();
        }
        for effect in self.insertion {
            effect.run();
        }
        for node_ref in self.detach {
            node_ref.apply(None);
        }
        for (node_ref, public) in self.attach {
            node_ref.apply(public);
        }
        for effect in self.layout {
            effect.run();
        }
        for (config, error) in self.caught {
            if let Some(on_catch) = &config.on_catch {
                on_catch(&error);
            }
        }
        self.passive
    }
}

// =============================================================================
// Commit Root
// =============================================================================

/// Commit `cycle`. The cycle must be fully rendered.
pub(crate) fn commit_root<H: HostConfig>(
    state: &mut RootState<H>,
    cycle: &RenderCycle,
) -> Result<CommitActions> {
    let mut actions = CommitActions::default();
    let mut retired = Vec::new();

    state.host.prepare_for_commit(&mut state.container);

    let deletions = std::mem::take(&mut state.deletions);
    for &id in &deletions {
        commit_deletion(state, id, &mut actions)?;
    }
    commit_tree(state, cycle.root, &mut actions, &mut retired)?;

    state.host.reset_after_commit(&mut state.container);

    adopt(state, cycle);
    for id in retired {
        state.arena.remove(id);
    }
    state.arena.take_cycle_allocs();
    record_caught(state, &mut actions);
    state.commits += 1;

    debug!(
        cycle = cycle.id,
        deletions = deletions.len(),
        layout = actions.layout.len(),
        passive = actions.passive.len(),
        "commit finished"
    );
    Ok(actions)
}

/// Link the new generation where the old one was.
fn adopt<H: HostConfig>(state: &mut RootState<H>, cycle: &RenderCycle) {
    if cycle.replaces == state.current {
        state.current = cycle.root;
        return;
    }
    let Some(parent) = state.arena[cycle.root].parent else {
        return;
    };
    let arena = &mut state.arena;
    if arena[parent].first_child == Some(cycle.replaces) {
        arena[parent].first_child = Some(cycle.root);
        return;
    }
    let mut cursor = arena[parent].first_child;
    while let Some(sibling) = cursor {
        if arena[sibling].next_sibling == Some(cycle.replaces) {
            arena[sibling].next_sibling = Some(cycle.root);
            return;
        }
        cursor = arena[sibling].next_sibling;
    }
}

/// Mark every boundary that caught during the cycle, now that it is
/// committed, and queue its observer.
fn record_caught<H: HostConfig>(state: &mut RootState<H>, actions: &mut CommitActions) {
    for (config, error, handle) in std::mem::take(&mut state.caught) {
        match handle.current().and_then(|id| state.arena.get(id)) {
            Some(boundary) => *boundary.caught.borrow_mut() = Some(error.clone()),
            None => trace!(component = handle.name(), "boundary deleted before its error was recorded"),
        }
        actions.caught.push((config, error));
    }
}

// =============================================================================
// Host Parent / Sibling
// =============================================================================

enum HostParent<I> {
    Container,
    Instance(I),
}

/// Nearest ancestor owning the host instances of `id`.
fn host_parent<H: HostConfig>(arena: &NodeArena<H>, id: NodeId) -> HostParent<H::Instance> {
    let mut cursor = arena[id].parent;
    while let Some(parent) = cursor {
        let node = &arena[parent];
        match (&node.kind, &node.host) {
            (NodeKind::Root, _) => return HostParent::Container,
            (NodeKind::Host(_), Some(instance)) => return HostParent::Instance(instance.clone()),
            _ => cursor = node.parent,
        }
    }
    HostParent::Container
}

/// First stable host instance after `id` inside its host parent.
///
/// Skips placed nodes, since they are not in the host tree yet or are about
/// to move.
fn host_sibling<H: HostConfig>(arena: &NodeArena<H>, id: NodeId) -> Option<H::Instance> {
    let mut node = id;
    'search: loop {
        // Climb until a sibling exists, without leaving the host parent
        while arena[node].next_sibling.is_none() {
            let parent = arena[node].parent?;
            if arena[parent].tag().is_host_parent() {
                return None;
            }
            node = parent;
        }
        node = arena[node].next_sibling?;

        // Descend through pass-through nodes
        while !arena[node].tag().is_host() {
            if arena[node].effect_tag.contains(EffectTag::PLACEMENT) {
                continue 'search;
            }
            match arena[node].first_child {
                Some(child) => node = child,
                None => continue 'search,
            }
        }

        if !arena[node].effect_tag.contains(EffectTag::PLACEMENT) {
            return arena[node].host.clone();
        }
    }
}

/// Topmost host instances below a pass-through node that are not placed
/// themselves.
fn top_host_instances<H: HostConfig>(arena: &NodeArena<H>, id: NodeId) -> Vec<H::Instance> {
    let mut instances = Vec::new();
    let mut stack: Vec<NodeId> = arena.children(id).into_iter().rev().collect();
    while let Some(node_id) = stack.pop() {
        let node = &arena[node_id];
        if node.effect_tag.contains(EffectTag::PLACEMENT) {
            continue;
        }
        if node.tag().is_host() {
            instances.extend(node.host.clone());
        } else {
            stack.extend(arena.children(node_id).into_iter().rev());
        }
    }
    instances
}

fn insert<H: HostConfig>(
    host: &mut H,
    container: &mut H::Container,
    parent: &HostParent<H::Instance>,
    child: &H::Instance,
    before: Option<&H::Instance>,
) -> Result<()> {
    match (parent, before) {
        (HostParent::Container, Some(before)) => host.insert_in_container_before(container, child, before)?,
        (HostParent::Container, None) => host.append_child_to_container(container, child)?,
        (HostParent::Instance(parent), Some(before)) => host.insert_before(parent, child, before)?,
        (HostParent::Instance(parent), None) => host.append_child(parent, child)?,
    }
    Ok(())
}

fn remove<H: HostConfig>(
    host: &mut H,
    container: &mut H::Container,
    parent: &HostParent<H::Instance>,
    child: &H::Instance,
) -> Result<()> {
    match parent {
        HostParent::Container => host.remove_child_from_container(container, child)?,
        HostParent::Instance(parent) => host.remove_child(parent, child)?,
    }
    Ok(())
}

// =============================================================================
// Deletion
// =============================================================================

/// Detach the subtree of `id` from the host and collect its teardowns.
fn commit_deletion<H: HostConfig>(
    state: &mut RootState<H>,
    id: NodeId,
    actions: &mut CommitActions,
) -> Result<()> {
    let RootState {
        arena,
        host,
        container,
        ..
    } = state;
    arena[id].effect_tag = EffectTag::DELETION;
    trace!(node = arena[id].kind.name(), ?id, "deleting");

    // Only the topmost host instances leave their parent
    let parent = host_parent(arena, id);
    let mut stack = vec![id];
    while let Some(node_id) = stack.pop() {
        let node = &arena[node_id];
        if node.tag().is_host() {
            if let Some(instance) = &node.host {
                remove(host, container, &parent, instance)?;
            }
        } else {
            stack.extend(arena.children(node_id).into_iter().rev());
        }
    }

    // Children before parents
    let mut order = Vec::new();
    post_order(arena, id, &mut order);
    for &node_id in &order {
        let node = &arena[node_id];
        for record in &node.effects {
            actions.teardowns.extend(record.inst.take_destroy());
        }
        if node.tag().is_host() {
            if let Some(node_ref) = node.node_ref.clone() {
                actions.teardowns.push(Box::new(move || node_ref.apply(None)));
            }
        }
        node.handle.set_current(None);
    }
    for node_id in order {
        arena.remove(node_id);
    }
    Ok(())
}

fn post_order<H: HostConfig>(arena: &NodeArena<H>, id: NodeId, out: &mut Vec<NodeId>) {
    // (node, children visited)
    let mut stack = vec![(id, false)];
    while let Some((node_id, visited)) = stack.pop() {
        if visited {
            out.push(node_id);
            continue;
        }
        stack.push((node_id, true));
        stack.extend(arena.children(node_id).into_iter().rev().map(|child| (child, false)));
    }
}

// =============================================================================
// Mutation Walk
// =============================================================================

fn commit_tree<H: HostConfig>(
    state: &mut RootState<H>,
    root: NodeId,
    actions: &mut CommitActions,
    retired: &mut Vec<NodeId>,
) -> Result<()> {
    let mut node = root;
    loop {
        commit_node(state, node)?;
        if let Some(child) = state.arena[node].first_child {
            node = child;
            continue;
        }
        loop {
            complete_node(state, node, actions, retired);
            if node == root {
                return Ok(());
            }
            if let Some(sibling) = state.arena[node].next_sibling {
                node = sibling;
                break;
            }
            match state.arena[node].parent {
                Some(parent) => node = parent,
                None => return Ok(()),
            }
        }
    }
}

/// Pre-order step: host mutations for one node.
fn commit_node<H: HostConfig>(state: &mut RootState<H>, id: NodeId) -> Result<()> {
    let tag = state.arena[id].effect_tag;
    if tag.contains(EffectTag::PLACEMENT) {
        commit_placement(state, id)?;
    }
    if tag.contains(EffectTag::UPDATE) {
        commit_update(state, id)?;
    }

    let RootState { arena, host, .. } = state;
    let node = &mut arena[id];
    node.effect_tag = EffectTag::NONE;
    for hook in &mut node.hooks {
        hook.commit();
    }
    node.handle.set_current(Some(id));

    if node.needs_mount {
        node.needs_mount = false;
        if let (NodeKind::Host(ty), Some(instance)) = (&node.kind, &node.host) {
            host.commit_mount(instance, ty, &node.props)?;
        }
    }
    Ok(())
}

fn commit_placement<H: HostConfig>(state: &mut RootState<H>, id: NodeId) -> Result<()> {
    let RootState {
        arena,
        host,
        container,
        ..
    } = state;
    let parent = host_parent(arena, id);
    let before = match &arena[id].anchor {
        Anchor::Before(instance) => Some(instance.clone()),
        Anchor::Append => None,
        Anchor::Unresolved => host_sibling(arena, id),
    };

    let node = &arena[id];
    trace!(node = node.kind.name(), ?id, anchored = before.is_some(), "placing");
    if node.tag().is_host() {
        if let Some(instance) = &node.host {
            insert(host, container, &parent, instance, before.as_ref())?;
        }
    } else {
        // A moved pass-through node carries its stable host descendants
        for instance in top_host_instances(arena, id) {
            insert(host, container, &parent, &instance, before.as_ref())?;
        }
    }
    Ok(())
}

fn commit_update<H: HostConfig>(state: &mut RootState<H>, id: NodeId) -> Result<()> {
    let RootState { arena, host, .. } = state;
    let node = &arena[id];
    let Some(old) = node.alternate.and_then(|alternate| arena.get(alternate)) else {
        return Ok(());
    };
    let Some(instance) = &node.host else {
        return Ok(());
    };

    match &node.kind {
        NodeKind::Text if old.text != node.text => {
            host.commit_text_update(instance, &old.text, &node.text)?;
        }
        NodeKind::Host(ty) if !Rc::ptr_eq(&old.props, &node.props) => {
            if let Some(payload) = host.prepare_update(instance, ty, &old.props, &node.props) {
                host.commit_update(instance, payload, ty, &old.props, &node.props)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Post-order step: refs and effects, and retirement of the old generation.
fn complete_node<H: HostConfig>(
    state: &mut RootState<H>,
    id: NodeId,
    actions: &mut CommitActions,
    retired: &mut Vec<NodeId>,
) {
    let RootState { arena, host, .. } = state;

    let alternate = arena[id].alternate.take();
    let old_ref = alternate
        .and_then(|old| arena.get(old))
        .and_then(|old| old.node_ref.clone());
    retired.extend(alternate);

    let node = &mut arena[id];
    if node.tag().is_host() {
        match (old_ref, &node.node_ref) {
            (Some(old), Some(new)) if old.same(new) => {}
            (old, new) => {
                actions.detach.extend(old);
                if let Some(new) = new {
                    let public = node
                        .host
                        .as_ref()
                        .and_then(|instance| host.get_public_instance(instance));
                    actions.attach.push((new.clone(), public));
                }
            }
        }
    }

    for record in &mut node.effects {
        if !record.should_run() {
            continue;
        }
        let Some(create) = record.create.take() else {
            continue;
        };
        record.flags.remove(HookFlags::HAS_EFFECT);
        let kind = record.kind();
        let run = EffectRun {
            inst: record.inst.clone(),
            create,
        };
        if kind.contains(HookFlags::INSERTION) {
            actions.insertion.push(run);
        } else if kind.contains(HookFlags::LAYOUT) {
            actions.layout.push(run);
        } else {
            actions.passive.push(run);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_effect_run_tears_down_previous() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let inst = Rc::new(EffectInstance::default());

        let first = {
            let log = log.clone();
            EffectRun {
                inst: inst.clone(),
                create: Box::new(move || {
                    log.borrow_mut().push("create 1");
                    let log = log.clone();
                    Some(Box::new(move || log.borrow_mut().push("destroy 1")) as Cleanup)
                }),
            }
        };
        let second = {
            let log = log.clone();
            EffectRun {
                inst: inst.clone(),
                create: Box::new(move || {
                    log.borrow_mut().push("create 2");
                    None
                }),
            }
        };

        first.run();
        assert!(inst.has_destroy());
        second.run();
        assert!(!inst.has_destroy());
        assert_eq!(*log.borrow(), vec!["create 1", "destroy 1", "create 2"]);
    }

    #[test]
    fn test_actions_run_in_phase_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let push = |label: &'static str| {
            let log = log.clone();
            move || log.borrow_mut().push(label)
        };
        let effect = |label: &'static str| {
            let push = push(label);
            EffectRun {
                inst: Rc::new(EffectInstance::default()),
                create: Box::new(move || {
                    push();
                    None
                }),
            }
        };

        let node_ref = {
            let log = log.clone();
            NodeRef::callback(move |value| {
                log.borrow_mut()
                    .push(if value.is_some() { "attach" } else { "detach" })
            })
        };

        let mut actions = CommitActions::default();
        actions.passive.push(effect("passive"));
        actions.layout.push(effect("layout"));
        actions.attach.push((node_ref.clone(), Some(Rc::new(1) as PublicInstance)));
        actions.detach.push(node_ref);
        actions.insertion.push(effect("insertion"));
        actions.teardowns.push(Box::new(push("teardown")));

        let passive = actions.run();
        assert_eq!(
            *log.borrow(),
            vec!["teardown", "insertion", "detach", "attach", "layout"]
        );
        assert_eq!(passive.len(), 1);
    }
}
