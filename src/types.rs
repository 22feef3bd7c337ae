//! Core types for spark-reconciler.
//!
//! These types define the foundation that everything builds on.
//! They flow from element descriptions through the work-node tree and into
//! the commit engine.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// Value - Attribute and dependency values
// =============================================================================

/// A dynamically typed value used for host attributes and dependency lists.
///
/// Comparison follows "same value" semantics: primitives compare by value
/// (with `NaN` equal to itself), `Any` payloads compare by pointer identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// Opaque payload compared by identity (callbacks, shared objects).
    Any(Rc<dyn Any>),
}

impl Value {
    /// Identity comparison used by dependency lists and prop diffing.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Object.is: NaN equals NaN, +0 and -0 differ
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Any(a), Value::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Downcast an `Any` payload.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            Value::Any(any) => any.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Any(any) => write!(f, "<any@{:p}>", Rc::as_ptr(any)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}

impl<T: Any> From<Rc<T>> for Value {
    fn from(value: Rc<T>) -> Self {
        Value::Any(value)
    }
}

// =============================================================================
// Dependency lists
// =============================================================================

/// Dependency list for memo and effect hooks.
///
/// `None` means "always re-run"; `Some(vec![])` runs once.
pub type Deps = Option<Vec<Value>>;

/// Build a dependency list: `deps![a, b]` is `Some(vec![a.into(), b.into()])`.
#[macro_export]
macro_rules! deps {
    () => {
        Some(::std::vec::Vec::<$crate::Value>::new())
    };
    ($($dep:expr),+ $(,)?) => {
        Some(vec![$($crate::Value::from($dep)),+])
    };
}

/// Shallow dependency comparison.
///
/// Missing lists on either side always count as changed, as do lists of
/// different lengths.
pub fn deps_changed(prev: &Deps, next: &Deps) -> bool {
    match (prev, next) {
        (Some(prev), Some(next)) => {
            prev.len() != next.len() || prev.iter().zip(next).any(|(a, b)| !a.same(b))
        }
        _ => true,
    }
}

// =============================================================================
// Key - Sibling disambiguation
// =============================================================================

/// Element key, unique among siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(pub Rc<str>);

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key(value.to_string().into())
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key(value.to_string().into())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key(value.to_string().into())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Node Tags
// =============================================================================

/// Kind of a work node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    /// Root bound to a host container.
    Root,
    /// Function component (pass-through, no host instance).
    Component,
    /// Host element with a host instance.
    Host,
    /// Host text instance.
    Text,
    /// Context provider (pass-through).
    Provider,
    /// Suspense boundary (pass-through).
    Suspense,
    /// Error boundary (pass-through).
    ErrorBoundary,
}

impl NodeTag {
    /// Whether nodes of this kind own a host instance.
    pub fn is_host(self) -> bool {
        matches!(self, NodeTag::Host | NodeTag::Text)
    }

    /// Whether nodes of this kind can act as the parent container of host
    /// instances.
    pub fn is_host_parent(self) -> bool {
        matches!(self, NodeTag::Host | NodeTag::Root)
    }
}

// =============================================================================
// Effect Tags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Pending host operation computed by the diff engine.
    ///
    /// A moved node whose props also changed carries `PLACEMENT | UPDATE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EffectTag: u8 {
        const NONE = 0;
        const PLACEMENT = 1 << 0;
        const UPDATE = 1 << 1;
        const DELETION = 1 << 2;
    }
}

// =============================================================================
// Hook Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Category and pending state of an effect record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HookFlags: u8 {
        const NONE = 0;
        /// Create callback must run in the next commit.
        const HAS_EFFECT = 1 << 0;
        const INSERTION = 1 << 1;
        const LAYOUT = 1 << 2;
        const PASSIVE = 1 << 3;
    }
}

// =============================================================================
// Tests
// =============================================================================
