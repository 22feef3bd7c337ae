//! Diff engine - Keyed reconciliation of one node's children.
//!
//! Compares the committed child list of a node's alternate with the new child
//! descriptions and builds the work-in-progress child list:
//! - matched children (same key, same type) are cloned and tagged `UPDATE`
//! - children that moved left of the placement watermark get `PLACEMENT` too
//! - new children are created and tagged `PLACEMENT`
//! - unmatched old children go to the pending deletions
//!
//! Keyless children match by position, so reordering keyless siblings is an
//! update in place, never a move.
//!
//! The committed tree is only read here. The one side effect is appending
//! to the root's pending deletions.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::engine::{Anchor, NodeArena, NodeHandle, NodeId, NodeKind, WorkNode};
use crate::primitives::{Element, Props};
use crate::renderer::HostConfig;
use crate::types::{EffectTag, Key};

use super::work_loop::RootState;

/// Lookup key of an unmatched old child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Explicit(Key),
    Index(usize),
}

fn element_key(element: &Element) -> Option<&Key> {
    match element {
        Element::Node(node) => node.key.as_ref(),
        _ => None,
    }
}

/// Whether `element` can reuse `node` (type identity only).
fn same_type<H: HostConfig>(node: &WorkNode<H>, element: &Element) -> bool {
    match element {
        Element::Text(_) => matches!(node.kind, NodeKind::Text),
        Element::Node(el) => node.kind.same_type(&el.ty),
        _ => false,
    }
}

// =============================================================================
// Reconcile
// =============================================================================

/// Rebuild the children of work-in-progress node `parent` from `elements`.
///
/// `elements` must already be normalized (no empty, boolean or fragment
/// entries).
pub(crate) fn reconcile_children<H: HostConfig>(state: &mut RootState<H>, parent: NodeId, elements: &[Element]) {
    let old_first = state.arena[parent]
        .alternate
        .and_then(|alternate| state.arena.get(alternate))
        .and_then(|old| old.first_child);

    let mut children: Vec<NodeId> = Vec::with_capacity(elements.len());
    let mut last_placed = 0;
    let mut new_index = 0;
    let mut old = old_first;

    // Fast path: walk both lists while keys and types line up
    while let Some(old_id) = old {
        let Some(element) = elements.get(new_index) else {
            break;
        };
        let old_node = &state.arena[old_id];
        if old_node.key.as_ref() != element_key(element) || !same_type(old_node, element) {
            break;
        }
        let next_old = old_node.next_sibling;
        let id = update_node(state, parent, old_id, element);
        last_placed = place_child(&mut state.arena, id, last_placed, new_index);
        children.push(id);
        old = next_old;
        new_index += 1;
    }

    if new_index == elements.len() {
        while let Some(old_id) = old {
            old = state.arena[old_id].next_sibling;
            delete_child(state, old_id);
        }
    } else if old.is_none() {
        for (index, element) in elements.iter().enumerate().skip(new_index) {
            let id = create_node(state, parent, element);
            last_placed = place_child(&mut state.arena, id, last_placed, index);
            children.push(id);
        }
    } else {
        let mut existing: HashMap<MapKey, NodeId> = HashMap::new();
        while let Some(old_id) = old {
            let node = &state.arena[old_id];
            let key = match &node.key {
                Some(key) => MapKey::Explicit(key.clone()),
                None => MapKey::Index(node.index),
            };
            existing.insert(key, old_id);
            old = node.next_sibling;
        }

        for (index, element) in elements.iter().enumerate().skip(new_index) {
            let key = match element_key(element) {
                Some(key) => MapKey::Explicit(key.clone()),
                None => MapKey::Index(index),
            };
            let matched = existing
                .get(&key)
                .copied()
                .filter(|old_id| same_type(&state.arena[*old_id], element));
            let id = match matched {
                Some(old_id) => {
                    existing.remove(&key);
                    update_node(state, parent, old_id, element)
                }
                None => create_node(state, parent, element),
            };
            last_placed = place_child(&mut state.arena, id, last_placed, index);
            children.push(id);
        }

        // Leftovers are deleted in their old sibling order
        let mut leftovers: Vec<NodeId> = existing.into_values().collect();
        leftovers.sort_by_key(|id| state.arena[*id].index);
        for old_id in leftovers {
            delete_child(state, old_id);
        }
    }

    link_children(&mut state.arena, parent, &children);
    link_anchors(&mut state.arena, parent, &children);
}

/// Clone `old_id` into a new generation carrying `element`'s payload.
fn update_node<H: HostConfig>(state: &mut RootState<H>, parent: NodeId, old_id: NodeId, element: &Element) -> NodeId {
    let mut node = state.arena[old_id].clone_for_update(old_id);
    node.parent = Some(parent);
    match element {
        Element::Text(text) => node.text = text.clone(),
        Element::Node(el) => {
            node.kind = NodeKind::from_type(&el.ty);
            node.key = el.key.clone();
            node.props = el.props.clone();
            node.node_ref = el.node_ref.clone();
        }
        Element::Empty | Element::Bool(_) | Element::Fragment(_) => {}
    }
    state.arena.insert(node)
}

fn create_node<H: HostConfig>(state: &mut RootState<H>, parent: NodeId, element: &Element) -> NodeId {
    let mut node = match element {
        Element::Node(el) => {
            let kind = NodeKind::from_type(&el.ty);
            let handle = NodeHandle::new(state.sink.clone(), kind.name());
            let mut node = WorkNode::new(kind, el.key.clone(), el.props.clone(), handle);
            node.node_ref = el.node_ref.clone();
            node
        }
        Element::Text(text) => {
            let handle = NodeHandle::new(state.sink.clone(), NodeKind::Text.name());
            let mut node = WorkNode::new(NodeKind::Text, None, Rc::new(Props::new()), handle);
            node.text = text.clone();
            node
        }
        // Filtered out by normalization
        Element::Empty | Element::Bool(_) | Element::Fragment(_) => {
            let handle = NodeHandle::new(state.sink.clone(), NodeKind::Text.name());
            WorkNode::new(NodeKind::Text, None, Rc::new(Props::new()), handle)
        }
    };
    node.parent = Some(parent);
    node.effect_tag = EffectTag::PLACEMENT;
    state.arena.insert(node)
}

/// Record the new index and apply the placement watermark rule.
///
/// Returns the new watermark.
fn place_child<H: HostConfig>(arena: &mut NodeArena<H>, id: NodeId, last_placed: usize, new_index: usize) -> usize {
    let old_index = arena[id]
        .alternate
        .and_then(|alternate| arena.get(alternate))
        .map(|old| old.index);
    let node = &mut arena[id];
    node.index = new_index;
    match old_index {
        Some(old_index) if old_index < last_placed => {
            // Moved left of an already placed sibling
            node.effect_tag |= EffectTag::PLACEMENT;
            last_placed
        }
        Some(old_index) => old_index,
        None => {
            node.effect_tag |= EffectTag::PLACEMENT;
            last_placed
        }
    }
}

fn delete_child<H: HostConfig>(state: &mut RootState<H>, old_id: NodeId) {
    trace!(node = ?old_id, "scheduled for deletion");
    state.deletions.push(old_id);
}

fn link_children<H: HostConfig>(arena: &mut NodeArena<H>, parent: NodeId, children: &[NodeId]) {
    arena[parent].first_child = children.first().copied();
    for pair in children.windows(2) {
        arena[pair[0]].next_sibling = Some(pair[1]);
    }
    if let Some(last) = children.last() {
        arena[*last].next_sibling = None;
    }
}

/// Second pass: give every child the nearest following sibling that keeps
/// its position and bears a host instance.
fn link_anchors<H: HostConfig>(arena: &mut NodeArena<H>, parent: NodeId, children: &[NodeId]) {
    let mut next = if arena[parent].tag().is_host_parent() {
        Anchor::Append
    } else {
        Anchor::Unresolved
    };
    for id in children.iter().rev() {
        let node = &mut arena[*id];
        node.anchor = next.clone();
        if !node.effect_tag.contains(EffectTag::PLACEMENT) {
            next = match (&node.host, node.tag().is_host()) {
                (Some(instance), true) => Anchor::Before(instance.clone()),
                _ => Anchor::Unresolved,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::UpdateSink;
    use crate::pipeline::work_loop::RootState;
    use crate::renderer::{MemoryContainer, MemoryHost};
    use std::rc::Weak;

    struct NoSink;

    impl UpdateSink for NoSink {
        fn schedule_update(&self, _handle: &NodeHandle) {}
    }

    fn state() -> RootState<MemoryHost> {
        let sink: Weak<dyn UpdateSink> = Weak::<NoSink>::new();
        RootState::new(MemoryHost::new(), MemoryContainer::new(), sink)
    }

    fn keyed(keys: &[&str]) -> Vec<Element> {
        keys.iter().map(|k| Element::host("item").key(*k)).collect()
    }

    /// Reconcile `elements` as the first children of a committed root.
    fn mount(state: &mut RootState<MemoryHost>, elements: &[Element]) -> NodeId {
        let parent = state.current;
        reconcile_children(state, parent, elements);
        for child in state.arena.children(parent) {
            state.arena[child].effect_tag = EffectTag::NONE;
            state.arena[child].alternate = None;
        }
        state.deletions.clear();
        parent
    }

    /// Reconcile `elements` against the children of `old`. Returns the new
    /// parent.
    fn update(state: &mut RootState<MemoryHost>, old: NodeId, elements: &[Element]) -> NodeId {
        let next = state.arena[old].clone_for_update(old);
        let parent = state.arena.insert(next);
        reconcile_children(state, parent, elements);
        parent
    }

    fn count(state: &RootState<MemoryHost>, parent: NodeId, tag: EffectTag) -> usize {
        state
            .arena
            .children(parent)
            .into_iter()
            .filter(|id| state.arena[*id].effect_tag.contains(tag))
            .count()
    }

    #[test]
    fn test_mount_places_every_child() {
        let mut state = state();
        let parent = state.current;
        reconcile_children(&mut state, parent, &keyed(&["a", "b", "c"]));
        assert_eq!(count(&state, parent, EffectTag::PLACEMENT), 3);
        assert_eq!(count(&state, parent, EffectTag::UPDATE), 0);
        assert!(state.deletions.is_empty());
    }

    #[test]
    fn test_identity_preserved_on_same_keys() {
        let mut state = state();
        let old = mount(&mut state, &keyed(&["a", "b"]));
        let old_children = state.arena.children(old);
        let new = update(&mut state, old, &keyed(&["a", "b"]));
        let new_children = state.arena.children(new);
        for (old_id, new_id) in old_children.iter().zip(&new_children) {
            let node = &state.arena[*new_id];
            assert_eq!(node.alternate, Some(*old_id));
            assert!(node.handle.same(&state.arena[*old_id].handle));
            assert_eq!(node.effect_tag, EffectTag::UPDATE);
        }
    }

    #[test]
    fn test_remove_one_keyed_child() {
        let mut state = state();
        let old = mount(&mut state, &keyed(&["a", "b", "c", "d"]));
        let new = update(&mut state, old, &keyed(&["a", "c", "d"]));
        assert_eq!(count(&state, new, EffectTag::UPDATE), 3);
        assert_eq!(count(&state, new, EffectTag::PLACEMENT), 0);
        assert_eq!(state.deletions.len(), 1);
    }

    #[test]
    fn test_reverse_moves_all_but_the_anchor() {
        let mut state = state();
        let old = mount(&mut state, &keyed(&["a", "b", "c", "d"]));
        let new = update(&mut state, old, &keyed(&["d", "c", "b", "a"]));
        assert_eq!(count(&state, new, EffectTag::PLACEMENT), 3);
        assert_eq!(count(&state, new, EffectTag::UPDATE), 4);
        assert!(state.deletions.is_empty());
    }

    #[test]
    fn test_keyless_reorder_is_positional() {
        let mut state = state();
        let old = mount(&mut state, &[Element::host("a"), Element::host("a")]);
        let new = update(&mut state, old, &[Element::host("a").attr("x", 1), Element::host("a")]);
        assert_eq!(count(&state, new, EffectTag::PLACEMENT), 0);
        assert_eq!(count(&state, new, EffectTag::UPDATE), 2);
    }

    #[test]
    fn test_type_change_replaces_node() {
        let mut state = state();
        let old = mount(&mut state, &[Element::host("a"), Element::from("text")]);
        let new = update(&mut state, old, &[Element::host("b"), Element::from("text")]);
        let children = state.arena.children(new);
        assert_eq!(state.arena[children[0]].effect_tag, EffectTag::PLACEMENT);
        assert_eq!(state.arena[children[1]].effect_tag, EffectTag::UPDATE);
        assert_eq!(state.deletions.len(), 1);
    }

    #[test]
    fn test_append_and_truncate() {
        let mut state = state();
        let old = mount(&mut state, &keyed(&["a"]));
        let grown = update(&mut state, old, &keyed(&["a", "b", "c"]));
        assert_eq!(count(&state, grown, EffectTag::PLACEMENT), 2);

        let mut state = self::state();
        let old = mount(&mut state, &keyed(&["a", "b", "c"]));
        let shrunk = update(&mut state, old, &keyed(&["a"]));
        assert_eq!(state.arena.children(shrunk).len(), 1);
        assert_eq!(state.deletions.len(), 2);
    }

    #[test]
    fn test_explicit_key_does_not_match_index() {
        let mut state = state();
        // Old keyless child at index 1, new child with key "1" at index 1
        let old = mount(&mut state, &[Element::host("x").key("0"), Element::host("a")]);
        let new = update(&mut state, old, &[Element::host("y"), Element::host("a").key("1")]);
        assert_eq!(count(&state, new, EffectTag::PLACEMENT), 2);
        assert_eq!(state.deletions.len(), 2);
    }

    #[test]
    fn test_anchor_for_placed_child() {
        let mut state = state();
        let old = mount(&mut state, &keyed(&["b"]));
        let b = state.arena.children(old)[0];
        let instance = state.host.create_instance("item", &Props::new()).unwrap();
        state.arena[b].host = Some(instance.clone());

        let new = update(&mut state, old, &keyed(&["a", "b"]));
        let children = state.arena.children(new);
        assert!(matches!(&state.arena[children[0]].anchor, Anchor::Before(i) if i.id() == instance.id()));
        assert!(matches!(state.arena[children[1]].anchor, Anchor::Append));
    }
}
