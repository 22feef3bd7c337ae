//! Context - Values provided to a whole subtree.
//!
//! ```ignore
//! let theme = Context::new("light");
//! let view = theme.provide("dark", Element::component(&toolbar, Props::new()));
//! // inside toolbar
//! let current = use_context(&theme); // "dark"
//! ```

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::primitives::{ContextId, Element, ElementType, Props, ProviderValue};

use super::frame::with_frame;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Context object: identity plus the default value used with no provider.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

impl<T: 'static> Context<T> {
    pub fn new(default: T) -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            default: Rc::new(default),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Provider element making `value` visible to `children`.
    pub fn provide(&self, value: T, children: impl Into<Element>) -> Element {
        let provider = ProviderValue {
            id: self.id,
            value: Rc::new(value),
        };
        Element::from_type(ElementType::Provider(provider), Props::new()).child(children)
    }
}

/// Value of the nearest provider above the calling component.
///
/// Walks the ancestors on every call, falling back to the default.
pub fn use_context<T: 'static>(context: &Context<T>) -> Rc<T> {
    let (source, node) = with_frame(|frame| (frame.context.clone(), frame.node));
    source
        .read_context(node, context.id)
        .and_then(|value| value.downcast::<T>().ok())
        .unwrap_or_else(|| context.default.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mount::{container_texts, render_now, test_root};
    use crate::primitives::Component;

    fn reader(context: &Context<&'static str>) -> Component {
        let context = context.clone();
        Component::new("Reader", move |_| Ok(Element::text(*use_context(&context))))
    }

    #[test]
    fn test_nearest_provider_wins() {
        let theme = Context::new("light");
        let reader = reader(&theme);
        let read = || Element::component(&reader, Props::new());

        let (root, _) = test_root();
        render_now(
            &root,
            Element::fragment([
                read(),
                theme.provide("dark", Element::fragment([read(), theme.provide("night", read())])),
            ]),
        );
        assert_eq!(container_texts(&root), vec!["light", "dark", "night"]);
    }

    #[test]
    fn test_provider_value_change_reaches_readers() {
        let theme = Context::new("light");
        let reader = reader(&theme);
        let tree = |value| theme.provide(value, Element::host("panel").child(Element::component(&reader, Props::new())));

        let (root, log) = test_root();
        render_now(&root, tree("a"));
        log.clear();
        render_now(&root, tree("b"));

        let ops = log.ops();
        assert_eq!(ops.len(), 1);
        root.with_host(|_, c| {
            let panel = c.snapshot().remove(0);
            assert_eq!(panel.children[0].props["value"].as_str(), Some("b"));
        });
    }

    #[test]
    fn test_unrelated_contexts_are_independent() {
        let theme = Context::new("light");
        let locale = Context::new("en");
        let reader = reader(&theme);

        let (root, _) = test_root();
        render_now(&root, locale.provide("fr", Element::component(&reader, Props::new())));
        assert_eq!(container_texts(&root), vec!["light"]);
    }
}
