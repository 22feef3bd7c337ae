//! Primitive types - Props, refs, cleanup and element types.
//!
//! These types define the interface between component code and the engine.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{ComponentError, Thrown};
use crate::types::Value;

use super::element::Element;

// =============================================================================
// Cleanup Function
// =============================================================================

/// Teardown returned by effect callbacks.
///
/// Runs before the effect is re-created and when its node is deleted.
pub type Cleanup = Box<dyn FnOnce()>;

/// Result of a component render.
pub type ComponentResult = Result<Element, Thrown>;

/// Public instance handed to refs (whatever the host exposes).
pub type PublicInstance = Rc<dyn Any>;

// =============================================================================
// Props
// =============================================================================

/// Immutable snapshot of an element's properties for one render generation.
#[derive(Clone, Default)]
pub struct Props {
    /// Named attributes, compared by the host when computing updates.
    pub attrs: BTreeMap<Rc<str>, Value>,
    /// Child descriptions.
    pub children: Vec<Element>,
    /// Ref given to a component element, for the component to pass on.
    pub(crate) forwarded_ref: Option<NodeRef>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Ref attached to the component element being rendered.
    ///
    /// Components have no host instance, so their ref is only ever set by
    /// attaching it to an element the component renders.
    pub fn forwarded_ref(&self) -> Option<&NodeRef> {
        self.forwarded_ref.as_ref()
    }

    /// Whether two snapshots carry the same attributes (children ignored).
    pub fn same_attrs(&self, other: &Props) -> bool {
        self.attrs.len() == other.attrs.len()
            && self
                .attrs
                .iter()
                .zip(other.attrs.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.same(vb))
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attrs", &self.attrs)
            .field("children", &self.children.len())
            .field("forwarded_ref", &self.forwarded_ref.is_some())
            .finish()
    }
}

// =============================================================================
// Refs
// =============================================================================

/// Mutable ref cell whose `.current` the engine sets to a public instance.
#[derive(Clone, Default)]
pub struct RefObject(Rc<RefCell<Option<PublicInstance>>>);

impl RefObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<PublicInstance> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Option<PublicInstance>) {
        *self.0.borrow_mut() = value;
    }

    /// Downcast the current value.
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        self.current().and_then(|v| v.downcast::<T>().ok())
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

/// Ref attached to an element: either an object ref or a callback ref.
#[derive(Clone)]
pub enum NodeRef {
    Object(RefObject),
    Callback(Rc<dyn Fn(Option<PublicInstance>)>),
}

impl NodeRef {
    pub fn callback(f: impl Fn(Option<PublicInstance>) + 'static) -> Self {
        NodeRef::Callback(Rc::new(f))
    }

    /// Attach (`Some`) or detach (`None`) a public instance.
    pub fn apply(&self, value: Option<PublicInstance>) {
        match self {
            NodeRef::Object(obj) => obj.set(value),
            NodeRef::Callback(f) => f(value),
        }
    }

    pub fn same(&self, other: &NodeRef) -> bool {
        match (self, other) {
            (NodeRef::Object(a), NodeRef::Object(b)) => Rc::ptr_eq(&a.0, &b.0),
            (NodeRef::Callback(a), NodeRef::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<RefObject> for NodeRef {
    fn from(obj: RefObject) -> Self {
        NodeRef::Object(obj)
    }
}

// =============================================================================
// Component
// =============================================================================

/// A function component.
///
/// Identity is the allocation of the render function: clone a `Component`
/// to reuse it, creating a new one makes the diff engine treat it as a
/// different type.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    render: Rc<dyn Fn(&Props) -> ComponentResult>,
}

impl Component {
    pub fn new(name: &'static str, render: impl Fn(&Props) -> ComponentResult + 'static) -> Self {
        Self {
            name,
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props) -> ComponentResult {
        (self.render)(props)
    }

    pub fn same(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

// =============================================================================
// Special element payloads
// =============================================================================

/// Identity of a context object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) u64);

/// Value carried by a provider element.
#[derive(Clone)]
pub struct ProviderValue {
    pub(crate) id: ContextId,
    pub(crate) value: Rc<dyn Any>,
}

/// Fallback shown while a descendant is suspended.
#[derive(Clone)]
pub struct SuspenseConfig {
    pub(crate) fallback: Rc<Element>,
}

/// Recovery behavior of an error boundary.
///
/// `fallback` derives the content to show from the caught error,
/// `on_catch` observes the error during commit. A boundary with neither is
/// not a boundary.
#[derive(Clone, Default)]
pub struct BoundaryConfig {
    pub(crate) fallback: Option<Rc<dyn Fn(&ComponentError) -> Element>>,
    pub(crate) on_catch: Option<Rc<dyn Fn(&ComponentError)>>,
}

impl BoundaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, f: impl Fn(&ComponentError) -> Element + 'static) -> Self {
        self.fallback = Some(Rc::new(f));
        self
    }

    pub fn on_catch(mut self, f: impl Fn(&ComponentError) + 'static) -> Self {
        self.on_catch = Some(Rc::new(f));
        self
    }

    pub(crate) fn recovers(&self) -> bool {
        self.fallback.is_some() || self.on_catch.is_some()
    }
}

// =============================================================================
// Element Type
// =============================================================================

/// Type of a non-text element.
#[derive(Clone)]
pub enum ElementType {
    Host(Rc<str>),
    Component(Component),
    Provider(ProviderValue),
    Suspense(SuspenseConfig),
    ErrorBoundary(BoundaryConfig),
}

impl ElementType {
    /// Type identity used by the diff engine.
    ///
    /// Payloads (provider values, fallbacks) are props, not identity.
    pub fn same_type(&self, other: &ElementType) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Component(a), ElementType::Component(b)) => a.same(b),
            (ElementType::Provider(a), ElementType::Provider(b)) => a.id == b.id,
            (ElementType::Suspense(_), ElementType::Suspense(_)) => true,
            (ElementType::ErrorBoundary(_), ElementType::ErrorBoundary(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Host(tag) => write!(f, "Host({tag})"),
            ElementType::Component(c) => write!(f, "{c:?}"),
            ElementType::Provider(p) => write!(f, "Provider({})", p.id.0),
            ElementType::Suspense(_) => write!(f, "Suspense"),
            ElementType::ErrorBoundary(_) => write!(f, "ErrorBoundary"),
        }
    }
}
