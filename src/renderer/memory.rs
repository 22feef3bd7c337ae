//! In-memory host.
//!
//! Renders into a tree of [`MemoryNode`]s and records every host call in a
//! shared [`HostLog`]. Used by the tests and demos; it is also a compact
//! reference for writing real adapters.
//!
//! Text instances snapshot as `{type: "text", props: {value}}`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::HostError;
use crate::primitives::{Props, PublicInstance};
use crate::types::Value;

use super::host::{HostConfig, HostResult};

/// Props key that makes [`MemoryHost`] request a `commit_mount`.
pub const AUTOFOCUS: &str = "autofocus";

// =============================================================================
// Host tree
// =============================================================================

/// One backend node.
#[derive(Debug)]
pub struct MemoryNode {
    pub id: u64,
    pub ty: String,
    pub props: BTreeMap<String, Value>,
    pub children: Vec<MemoryInstance>,
}

/// Shared handle to a backend node.
#[derive(Clone)]
pub struct MemoryInstance(Rc<RefCell<MemoryNode>>);

impl MemoryInstance {
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    pub fn ty(&self) -> String {
        self.0.borrow().ty.clone()
    }

    /// Ids of the attached children, in order.
    pub fn child_ids(&self) -> Vec<u64> {
        self.0.borrow().children.iter().map(MemoryInstance::id).collect()
    }

    pub fn snapshot(&self) -> HostSnapshot {
        let node = self.0.borrow();
        HostSnapshot {
            ty: node.ty.clone(),
            props: node.props.clone(),
            children: node.children.iter().map(MemoryInstance::snapshot).collect(),
        }
    }

    fn same(&self, other: &MemoryInstance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MemoryInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryInstance({})", self.id())
    }
}

/// Plain-data copy of a host subtree, for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub ty: String,
    pub props: BTreeMap<String, Value>,
    pub children: Vec<HostSnapshot>,
}

impl HostSnapshot {
    pub fn new(ty: &str) -> Self {
        Self {
            ty: ty.to_string(),
            props: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(value: &str) -> Self {
        Self::new("text").prop("value", value)
    }

    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    pub fn child(mut self, child: HostSnapshot) -> Self {
        self.children.push(child);
        self
    }
}

/// Root container.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    pub children: Vec<MemoryInstance>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<HostSnapshot> {
        self.children.iter().map(MemoryInstance::snapshot).collect()
    }
}

// =============================================================================
// Call log
// =============================================================================

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateInstance { id: u64, ty: String },
    CreateText { id: u64, text: String },
    AppendChild { parent: u64, child: u64 },
    InsertBefore { parent: u64, child: u64, before: u64 },
    RemoveChild { parent: u64, child: u64 },
    AppendToContainer { child: u64 },
    InsertInContainerBefore { child: u64, before: u64 },
    RemoveFromContainer { child: u64 },
    CommitUpdate { id: u64 },
    CommitTextUpdate { id: u64, old: String, new: String },
    CommitMount { id: u64 },
}

impl HostOp {
    /// Whether this call mutates the host tree.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostOp::CreateInstance { .. } | HostOp::CreateText { .. })
    }

    pub fn is_placement(&self) -> bool {
        matches!(
            self,
            HostOp::AppendChild { .. }
                | HostOp::InsertBefore { .. }
                | HostOp::AppendToContainer { .. }
                | HostOp::InsertInContainerBefore { .. }
        )
    }
}

/// Shared, clonable view of the calls a [`MemoryHost`] received.
#[derive(Clone, Default)]
pub struct HostLog(Rc<RefCell<Vec<HostOp>>>);

impl HostLog {
    fn push(&self, op: HostOp) {
        self.0.borrow_mut().push(op);
    }

    pub fn ops(&self) -> Vec<HostOp> {
        self.0.borrow().clone()
    }

    /// Take and clear the recorded calls.
    pub fn drain(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn mutation_count(&self) -> usize {
        self.0.borrow().iter().filter(|op| op.is_mutation()).count()
    }
}

// =============================================================================
// Host
// =============================================================================

/// In-memory [`HostConfig`].
#[derive(Default)]
pub struct MemoryHost {
    next_id: u64,
    log: HostLog,
    fail_on: Option<&'static str>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose `operation` always fails (error-path tests).
    pub fn failing(operation: &'static str) -> Self {
        Self {
            fail_on: Some(operation),
            ..Self::default()
        }
    }

    pub fn log(&self) -> HostLog {
        self.log.clone()
    }

    fn check(&self, operation: &'static str) -> HostResult<()> {
        match self.fail_on {
            Some(op) if op == operation => Err(HostError::new(operation, "injected failure")),
            _ => Ok(()),
        }
    }

    fn alloc(&mut self, ty: &str, props: BTreeMap<String, Value>) -> MemoryInstance {
        self.next_id += 1;
        MemoryInstance(Rc::new(RefCell::new(MemoryNode {
            id: self.next_id,
            ty: ty.to_string(),
            props,
            children: Vec::new(),
        })))
    }
}

fn instance_props(props: &Props) -> BTreeMap<String, Value> {
    props
        .attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn position(children: &[MemoryInstance], child: &MemoryInstance) -> Option<usize> {
    children.iter().position(|c| c.same(child))
}

fn detach(children: &mut Vec<MemoryInstance>, child: &MemoryInstance) {
    if let Some(at) = position(children, child) {
        children.remove(at);
    }
}

fn insert(children: &mut Vec<MemoryInstance>, child: &MemoryInstance, before: Option<&MemoryInstance>) -> HostResult<()> {
    // Moving an attached child: detach first, like the DOM does
    detach(children, child);
    match before {
        Some(before) => {
            let at = position(children, before)
                .ok_or_else(|| HostError::new("insert_before", "reference child not found"))?;
            children.insert(at, child.clone());
        }
        None => children.push(child.clone()),
    }
    Ok(())
}

impl HostConfig for MemoryHost {
    type Container = MemoryContainer;
    type Instance = MemoryInstance;
    type UpdatePayload = BTreeMap<String, Value>;

    fn create_instance(&mut self, ty: &str, props: &Props) -> HostResult<MemoryInstance> {
        self.check("create_instance")?;
        let instance = self.alloc(ty, instance_props(props));
        self.log.push(HostOp::CreateInstance {
            id: instance.id(),
            ty: ty.to_string(),
        });
        Ok(instance)
    }

    fn create_text_instance(&mut self, text: &str) -> HostResult<MemoryInstance> {
        self.check("create_text_instance")?;
        let mut props = BTreeMap::new();
        props.insert("value".to_string(), Value::from(text));
        let instance = self.alloc("text", props);
        self.log.push(HostOp::CreateText {
            id: instance.id(),
            text: text.to_string(),
        });
        Ok(instance)
    }

    fn finalize_initial_children(&mut self, _instance: &MemoryInstance, _ty: &str, props: &Props) -> bool {
        props.get(AUTOFOCUS).and_then(Value::as_bool).unwrap_or(false)
    }

    fn append_child(&mut self, parent: &MemoryInstance, child: &MemoryInstance) -> HostResult<()> {
        self.check("append_child")?;
        insert(&mut parent.0.borrow_mut().children, child, None)?;
        self.log.push(HostOp::AppendChild {
            parent: parent.id(),
            child: child.id(),
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &MemoryInstance,
        child: &MemoryInstance,
        before: &MemoryInstance,
    ) -> HostResult<()> {
        self.check("insert_before")?;
        insert(&mut parent.0.borrow_mut().children, child, Some(before))?;
        self.log.push(HostOp::InsertBefore {
            parent: parent.id(),
            child: child.id(),
            before: before.id(),
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &MemoryInstance, child: &MemoryInstance) -> HostResult<()> {
        self.check("remove_child")?;
        detach(&mut parent.0.borrow_mut().children, child);
        self.log.push(HostOp::RemoveChild {
            parent: parent.id(),
            child: child.id(),
        });
        Ok(())
    }

    fn append_child_to_container(
        &mut self,
        container: &mut MemoryContainer,
        child: &MemoryInstance,
    ) -> HostResult<()> {
        self.check("append_child_to_container")?;
        insert(&mut container.children, child, None)?;
        self.log.push(HostOp::AppendToContainer { child: child.id() });
        Ok(())
    }

    fn insert_in_container_before(
        &mut self,
        container: &mut MemoryContainer,
        child: &MemoryInstance,
        before: &MemoryInstance,
    ) -> HostResult<()> {
        self.check("insert_in_container_before")?;
        insert(&mut container.children, child, Some(before))?;
        self.log.push(HostOp::InsertInContainerBefore {
            child: child.id(),
            before: before.id(),
        });
        Ok(())
    }

    fn remove_child_from_container(
        &mut self,
        container: &mut MemoryContainer,
        child: &MemoryInstance,
    ) -> HostResult<()> {
        self.check("remove_child_from_container")?;
        detach(&mut container.children, child);
        self.log.push(HostOp::RemoveFromContainer { child: child.id() });
        Ok(())
    }

    fn prepare_update(
        &mut self,
        _instance: &MemoryInstance,
        _ty: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<BTreeMap<String, Value>> {
        if old_props.same_attrs(new_props) {
            None
        } else {
            Some(instance_props(new_props))
        }
    }

    fn commit_update(
        &mut self,
        instance: &MemoryInstance,
        payload: BTreeMap<String, Value>,
        _ty: &str,
        _old_props: &Props,
        _new_props: &Props,
    ) -> HostResult<()> {
        self.check("commit_update")?;
        instance.0.borrow_mut().props = payload;
        self.log.push(HostOp::CommitUpdate { id: instance.id() });
        Ok(())
    }

    fn commit_text_update(
        &mut self,
        instance: &MemoryInstance,
        old_text: &str,
        new_text: &str,
    ) -> HostResult<()> {
        self.check("commit_text_update")?;
        instance
            .0
            .borrow_mut()
            .props
            .insert("value".to_string(), Value::from(new_text));
        self.log.push(HostOp::CommitTextUpdate {
            id: instance.id(),
            old: old_text.to_string(),
            new: new_text.to_string(),
        });
        Ok(())
    }

    fn get_public_instance(&self, instance: &MemoryInstance) -> Option<PublicInstance> {
        Some(Rc::new(instance.clone()))
    }

    fn commit_mount(&mut self, instance: &MemoryInstance, _ty: &str, _props: &Props) -> HostResult<()> {
        self.log.push(HostOp::CommitMount { id: instance.id() });
        Ok(())
    }
}
