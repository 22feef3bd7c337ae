//! Render frame - The "currently rendering" context hooks read from.
//!
//! Hook primitives take no node argument. While a component runs, the work
//! loop installs a [`RenderFrame`] in a thread-local cell; hooks append their
//! records to it positionally. The frame is removed again before the work
//! loop touches the tree, so no tree borrow is ever held across user code.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{NodeHandle, NodeId};
use crate::pipeline::Scheduler;
use crate::primitives::{Component, ComponentResult, ContextId, Props};
use crate::types::{deps_changed, Deps, HookFlags};

use super::records::{EffectCreate, EffectRecord, Hook};

/// Read access to provider values above a node.
pub(crate) trait ContextSource {
    /// Value of the nearest provider for `id` strictly above `from`.
    fn read_context(&self, from: NodeId, id: ContextId) -> Option<Rc<dyn Any>>;
}

// =============================================================================
// Frame
// =============================================================================

/// Per-render hook context of one component node.
pub(crate) struct RenderFrame {
    pub(crate) node: NodeId,
    pub(crate) handle: NodeHandle,
    pub(crate) scheduler: Scheduler,
    pub(crate) context: Rc<dyn ContextSource>,
    mounting: bool,
    previous: Vec<Hook>,
    previous_effects: Vec<EffectRecord>,
    hooks: Vec<Hook>,
    effects: Vec<EffectRecord>,
}

impl RenderFrame {
    /// `previous`/`previous_effects` are the committed slots of the node, empty
    /// on mount.
    pub(crate) fn new(
        node: NodeId,
        handle: NodeHandle,
        scheduler: Scheduler,
        context: Rc<dyn ContextSource>,
        previous: Vec<Hook>,
        previous_effects: Vec<EffectRecord>,
    ) -> Self {
        let mounting = previous.is_empty() && previous_effects.is_empty();
        Self {
            node,
            handle,
            scheduler,
            context,
            mounting,
            hooks: Vec::with_capacity(previous.len()),
            effects: Vec::with_capacity(previous_effects.len()),
            previous,
            previous_effects,
        }
    }

    /// Slot at the current cursor from the previous render, `None` on mount.
    pub(crate) fn previous_hook(&self, name: &'static str) -> Option<Hook> {
        if self.mounting {
            return None;
        }
        match self.previous.get(self.hooks.len()) {
            Some(hook) => Some(hook.clone()),
            None => order_violation(name),
        }
    }

    pub(crate) fn push_hook(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Append an effect slot, flagging it to run when its deps changed.
    pub(crate) fn push_effect(&mut self, kind: HookFlags, create: EffectCreate, deps: Deps) {
        let record = if self.mounting {
            EffectRecord {
                flags: kind | HookFlags::HAS_EFFECT,
                create: Some(create),
                deps,
                inst: Rc::default(),
            }
        } else {
            let Some(previous) = self.previous_effects.get(self.effects.len()) else {
                order_violation("use_effect")
            };
            if previous.kind() != kind {
                order_violation("use_effect");
            }
            if deps_changed(&previous.deps, &deps) {
                EffectRecord {
                    flags: kind | HookFlags::HAS_EFFECT,
                    create: Some(create),
                    deps,
                    inst: previous.inst.clone(),
                }
            } else {
                EffectRecord {
                    flags: kind,
                    create: None,
                    deps,
                    inst: previous.inst.clone(),
                }
            }
        };
        self.effects.push(record);
    }
}

/// Hooks must run in the same order on every render of a node.
pub(crate) fn order_violation(name: &'static str) -> ! {
    panic!("`{name}` was called in a different order than during the previous render")
}

// =============================================================================
// Thread-local frame
// =============================================================================

thread_local! {
    static CURRENT_FRAME: RefCell<Option<RenderFrame>> = const { RefCell::new(None) };
}

/// Run `f` against the frame of the component being rendered.
///
/// # Panics
/// When called outside a component render.
pub(crate) fn with_frame<R>(f: impl FnOnce(&mut RenderFrame) -> R) -> R {
    CURRENT_FRAME.with(|cell| {
        let mut frame = cell.borrow_mut();
        match frame.as_mut() {
            Some(frame) => f(frame),
            None => panic!("hooks can only be called while a component is rendering"),
        }
    })
}

/// Restores the outer frame even if the component panics.
struct FrameGuard {
    saved: Option<Option<RenderFrame>>,
}

impl FrameGuard {
    fn enter(frame: RenderFrame) -> Self {
        let saved = CURRENT_FRAME.with(|cell| cell.replace(Some(frame)));
        Self { saved: Some(saved) }
    }

    fn exit(mut self) -> Option<RenderFrame> {
        let saved = self.saved.take().flatten();
        CURRENT_FRAME.with(|cell| cell.replace(saved))
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            CURRENT_FRAME.with(|cell| {
                cell.replace(saved);
            });
        }
    }
}

/// Output of one component invocation.
pub(crate) struct RenderOutput {
    pub(crate) result: ComponentResult,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) effects: Vec<EffectRecord>,
    /// Slots the render started from, handed back for a thrown render.
    pub(crate) previous: Vec<Hook>,
    pub(crate) previous_effects: Vec<EffectRecord>,
}

/// Invoke `component` with `frame` installed as the current hook context.
pub(crate) fn render_with_hooks(frame: RenderFrame, component: &Component, props: &Props) -> RenderOutput {
    let guard = FrameGuard::enter(frame);
    let result = component.render(props);
    let Some(frame) = guard.exit() else {
        panic!("render frame of `{}` was removed while rendering", component.name())
    };

    if result.is_ok() && !frame.mounting && frame.hooks.len() != frame.previous.len() {
        panic!(
            "`{}` rendered {} hooks, previous render had {}",
            component.name(),
            frame.hooks.len(),
            frame.previous.len()
        );
    }

    RenderOutput {
        result,
        hooks: frame.hooks,
        effects: frame.effects,
        previous: frame.previous,
        previous_effects: frame.previous_effects,
    }
}

/// Whether a component render is in progress on this thread.
pub fn is_rendering() -> bool {
    CURRENT_FRAME.with(|cell| cell.borrow().is_some())
}
