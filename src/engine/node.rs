//! Work nodes - One component or host element for one render generation.
//!
//! # Dual buffering
//!
//! The committed tree is never mutated while rendering. A render builds
//! work-in-progress nodes with [`WorkNode::clone_for_update`], which shares
//! the hook slots and host instance of the committed node and points
//! `alternate` back at it. The commit adopts the new nodes and frees the old
//! generation; an abandoned render just frees what it allocated.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ComponentError;
use crate::hooks::records::{EffectRecord, Hook};
use crate::primitives::{
    BoundaryConfig, Component, ElementType, NodeRef, Props, ProviderValue, SuspenseConfig,
};
use crate::renderer::HostConfig;
use crate::types::{EffectTag, Key, NodeTag};

use super::arena::NodeId;
use super::handle::NodeHandle;

// =============================================================================
// Node Kind
// =============================================================================

/// Kind of a work node plus its type identity.
#[derive(Clone)]
pub(crate) enum NodeKind {
    Root,
    Text,
    Host(Rc<str>),
    Component(Component),
    Provider(ProviderValue),
    Suspense(SuspenseConfig),
    ErrorBoundary(BoundaryConfig),
}

impl NodeKind {
    pub(crate) fn from_type(ty: &ElementType) -> Self {
        match ty {
            ElementType::Host(tag) => NodeKind::Host(tag.clone()),
            ElementType::Component(component) => NodeKind::Component(component.clone()),
            ElementType::Provider(provider) => NodeKind::Provider(provider.clone()),
            ElementType::Suspense(config) => NodeKind::Suspense(config.clone()),
            ElementType::ErrorBoundary(config) => NodeKind::ErrorBoundary(config.clone()),
        }
    }

    pub(crate) fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Root => NodeTag::Root,
            NodeKind::Text => NodeTag::Text,
            NodeKind::Host(_) => NodeTag::Host,
            NodeKind::Component(_) => NodeTag::Component,
            NodeKind::Provider(_) => NodeTag::Provider,
            NodeKind::Suspense(_) => NodeTag::Suspense,
            NodeKind::ErrorBoundary(_) => NodeTag::ErrorBoundary,
        }
    }

    /// Whether an element of type `ty` can reuse a node of this kind.
    pub(crate) fn same_type(&self, ty: &ElementType) -> bool {
        match (self, ty) {
            (NodeKind::Host(a), ElementType::Host(b)) => a == b,
            (NodeKind::Component(a), ElementType::Component(b)) => a.same(b),
            (NodeKind::Provider(a), ElementType::Provider(b)) => a.id == b.id,
            (NodeKind::Suspense(_), ElementType::Suspense(_)) => true,
            (NodeKind::ErrorBoundary(_), ElementType::ErrorBoundary(_)) => true,
            _ => false,
        }
    }

    /// Name used in logs and errors.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "#root",
            NodeKind::Text => "#text",
            NodeKind::Host(_) => "#host",
            NodeKind::Component(component) => component.name(),
            NodeKind::Provider(_) => "#provider",
            NodeKind::Suspense(_) => "#suspense",
            NodeKind::ErrorBoundary(_) => "#error-boundary",
        }
    }
}

// =============================================================================
// Anchor
// =============================================================================

/// Where a placed node's host instances go among their siblings.
#[derive(Clone)]
pub(crate) enum Anchor<I> {
    /// A pass-through sibling sits in between; the commit walks the tree.
    Unresolved,
    /// No stable sibling follows inside the host parent.
    Append,
    /// Insert before this stable sibling instance.
    Before(I),
}

// =============================================================================
// Work Node
// =============================================================================

pub(crate) struct WorkNode<H: HostConfig> {
    pub(crate) kind: NodeKind,
    pub(crate) key: Option<Key>,
    pub(crate) props: Rc<Props>,
    /// Content of text nodes.
    pub(crate) text: Rc<str>,
    pub(crate) node_ref: Option<NodeRef>,

    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    /// Committed counterpart of a work-in-progress node.
    pub(crate) alternate: Option<NodeId>,

    /// Position among siblings, used for move detection.
    pub(crate) index: usize,
    pub(crate) effect_tag: EffectTag,

    pub(crate) host: Option<H::Instance>,
    /// Insertion point computed by the diff.
    pub(crate) anchor: Anchor<H::Instance>,
    /// The host asked for `commit_mount` after first insertion.
    pub(crate) needs_mount: bool,

    pub(crate) hooks: Vec<Hook>,
    pub(crate) effects: Vec<EffectRecord>,
    pub(crate) handle: NodeHandle,
    /// Error captured by an error boundary, shared by its generations.
    pub(crate) caught: Rc<RefCell<Option<ComponentError>>>,
}

impl<H: HostConfig> WorkNode<H> {
    pub(crate) fn new(kind: NodeKind, key: Option<Key>, props: Rc<Props>, handle: NodeHandle) -> Self {
        Self {
            kind,
            key,
            props,
            text: Rc::from(""),
            node_ref: None,
            parent: None,
            first_child: None,
            next_sibling: None,
            alternate: None,
            index: 0,
            effect_tag: EffectTag::NONE,
            host: None,
            anchor: Anchor::Unresolved,
            needs_mount: false,
            hooks: Vec::new(),
            effects: Vec::new(),
            handle,
            caught: Rc::default(),
        }
    }

    /// New generation of `self` (which is `id`).
    ///
    /// Shares hook slots, effect instances and the host instance; gets no
    /// children until the diff rebuilds them.
    pub(crate) fn clone_for_update(&self, id: NodeId) -> Self {
        Self {
            kind: self.kind.clone(),
            key: self.key.clone(),
            props: self.props.clone(),
            text: self.text.clone(),
            node_ref: self.node_ref.clone(),
            parent: self.parent,
            first_child: None,
            next_sibling: None,
            alternate: Some(id),
            index: self.index,
            effect_tag: EffectTag::UPDATE,
            host: self.host.clone(),
            anchor: Anchor::Unresolved,
            needs_mount: false,
            hooks: self.hooks.clone(),
            effects: self.effects.iter().map(EffectRecord::carry).collect(),
            handle: self.handle.clone(),
            caught: self.caught.clone(),
        }
    }

    pub(crate) fn tag(&self) -> NodeTag {
        self.kind.tag()
    }
}
