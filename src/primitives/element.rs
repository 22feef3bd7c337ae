//! Element descriptions - What the tree should look like now.
//!
//! Elements are cheap, immutable descriptions. The work loop turns them into
//! work nodes; nothing here talks to the host.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::Element;
//!
//! let tree = Element::host("element")
//!     .attr("foo", true)
//!     .child(Element::host("element"));
//! ```

use std::fmt;
use std::rc::Rc;

use crate::types::{Key, Value};

use super::types::{
    BoundaryConfig, Component, ElementType, NodeRef, Props, SuspenseConfig,
};

/// A single element node: type, key, props and ref.
#[derive(Clone)]
pub struct ElementNode {
    pub ty: ElementType,
    pub key: Option<Key>,
    pub props: Rc<Props>,
    pub node_ref: Option<NodeRef>,
}

/// Declarative child description.
///
/// `Empty` and `Bool` render nothing; `Fragment` is flattened into the
/// surrounding child list.
#[derive(Clone, Default)]
pub enum Element {
    #[default]
    Empty,
    Bool(bool),
    Text(Rc<str>),
    Fragment(Vec<Element>),
    Node(Rc<ElementNode>),
}

impl Element {
    fn node(ty: ElementType, props: Props) -> Self {
        Element::Node(Rc::new(ElementNode {
            ty,
            key: None,
            props: Rc::new(props),
            node_ref: None,
        }))
    }

    /// Host element with the given tag.
    pub fn host(tag: &str) -> Self {
        Self::node(ElementType::Host(tag.into()), Props::new())
    }

    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Element::Text(text.into())
    }

    /// Function component with props.
    pub fn component(component: &Component, props: Props) -> Self {
        Self::node(ElementType::Component(component.clone()), props)
    }

    /// Suspense boundary: renders `fallback` in place of a suspended
    /// descendant until its pending handle resolves.
    pub fn suspense(fallback: Element, children: impl Into<Element>) -> Self {
        let config = SuspenseConfig {
            fallback: Rc::new(fallback),
        };
        Self::node(ElementType::Suspense(config), Props::new()).child(children)
    }

    /// Error boundary around `children`.
    pub fn error_boundary(config: BoundaryConfig, children: impl Into<Element>) -> Self {
        Self::node(ElementType::ErrorBoundary(config), Props::new()).child(children)
    }

    pub fn fragment(children: impl IntoIterator<Item = Element>) -> Self {
        Element::Fragment(children.into_iter().collect())
    }

    pub(crate) fn from_type(ty: ElementType, props: Props) -> Self {
        Self::node(ty, props)
    }

    /// Apply `f` to the element node (no-op for text and empty elements).
    fn map_node(mut self, f: impl FnOnce(&mut ElementNode)) -> Self {
        if let Element::Node(node) = &mut self {
            f(Rc::make_mut(node));
        }
        self
    }

    pub fn key(self, key: impl Into<Key>) -> Self {
        let key = key.into();
        self.map_node(|node| node.key = Some(key))
    }

    pub fn attr(self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.map_node(|node| {
            Rc::make_mut(&mut node.props).attrs.insert(name.into(), value);
        })
    }

    pub fn child(self, child: impl Into<Element>) -> Self {
        let child = child.into();
        self.map_node(|node| Rc::make_mut(&mut node.props).children.push(child))
    }

    pub fn children(self, children: impl IntoIterator<Item = Element>) -> Self {
        self.map_node(|node| Rc::make_mut(&mut node.props).children.extend(children))
    }

    /// Attach a ref. Host elements receive their public instance; components
    /// read it back through [`Props::forwarded_ref`].
    pub fn with_ref(self, node_ref: impl Into<NodeRef>) -> Self {
        let node_ref = node_ref.into();
        self.map_node(|node| {
            if matches!(node.ty, ElementType::Component(_)) {
                Rc::make_mut(&mut node.props).forwarded_ref = Some(node_ref.clone());
            }
            node.node_ref = Some(node_ref);
        })
    }

    /// Whether this element renders nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Element::Empty | Element::Bool(_))
    }
}

/// Flatten a child description into the list the diff engine consumes.
///
/// Empty and boolean children are dropped, fragments are spliced in place,
/// and a single element becomes a one-element list.
pub fn normalize_children(children: &[Element]) -> Vec<Element> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        push_normalized(child, &mut out);
    }
    out
}

fn push_normalized(child: &Element, out: &mut Vec<Element>) {
    match child {
        Element::Empty | Element::Bool(_) => {}
        Element::Fragment(items) => {
            for item in items {
                push_normalized(item, out);
            }
        }
        Element::Text(_) | Element::Node(_) => out.push(child.clone()),
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Empty => write!(f, "Empty"),
            Element::Bool(b) => write!(f, "Bool({b})"),
            Element::Text(t) => write!(f, "Text({t:?})"),
            Element::Fragment(items) => f.debug_list().entries(items).finish(),
            Element::Node(node) => f
                .debug_struct("Element")
                .field("type", &node.ty)
                .field("key", &node.key)
                .field("props", &node.props)
                .finish(),
        }
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Text(value.into())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::Text(value.into())
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::Text(value.to_string().into())
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Self {
        Element::Text(value.to_string().into())
    }
}

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Element::Text(value.to_string().into())
    }
}

impl From<bool> for Element {
    fn from(value: bool) -> Self {
        Element::Bool(value)
    }
}

impl From<Vec<Element>> for Element {
    fn from(value: Vec<Element>) -> Self {
        Element::Fragment(value)
    }
}

impl From<Option<Element>> for Element {
    fn from(value: Option<Element>) -> Self {
        value.unwrap_or_default()
    }
}
