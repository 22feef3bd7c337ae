//! Memo hooks - Cached values keyed by a dependency list.
//!
//! `use_ref`, `use_callback` and `use_id` are memo slots with an empty or
//! caller-supplied dependency list.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::primitives::RefObject;
use crate::types::{deps_changed, Deps};

use super::frame::{order_violation, with_frame};
use super::records::Hook;

/// Memo slot shared by every hook in this module.
fn memo_slot<T: 'static>(name: &'static str, factory: impl FnOnce() -> T, deps: Deps) -> Rc<T> {
    let previous = with_frame(|frame| frame.previous_hook(name));

    let (value, deps): (Rc<dyn Any>, Deps) = match previous {
        Some(Hook::Memo { value, deps: prev }) if !deps_changed(&prev, &deps) => (value, prev),
        Some(Hook::Memo { .. }) | None => (Rc::new(factory()), deps),
        Some(Hook::State { .. }) => order_violation(name),
    };

    with_frame(|frame| {
        frame.push_hook(Hook::Memo {
            value: value.clone(),
            deps,
        })
    });
    value.downcast::<T>().unwrap_or_else(|_| order_violation(name))
}

/// Recompute `factory` only when `deps` changed.
///
/// `None` deps recompute on every render.
pub fn use_memo<T: Clone + 'static>(factory: impl FnOnce() -> T, deps: Deps) -> T {
    (*memo_slot("use_memo", factory, deps)).clone()
}

/// Keep the same callback allocation while `deps` are unchanged.
pub fn use_callback<F: 'static>(callback: F, deps: Deps) -> Rc<F> {
    memo_slot("use_callback", move || callback, deps)
}

/// Mutable box that lives as long as the component.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
    memo_slot("use_ref", move || RefCell::new(init()), crate::deps![])
}

/// Stable [`RefObject`] to attach to a host element.
pub fn use_ref_object() -> RefObject {
    (*memo_slot("use_ref_object", RefObject::new, crate::deps![])).clone()
}

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Identifier unique to this component instance.
pub fn use_id() -> Rc<str> {
    let id = memo_slot(
        "use_id",
        || {
            let n = NEXT_ID.with(|next| {
                let n = next.get();
                next.set(n + 1);
                n
            });
            Rc::<str>::from(format!(":r{n}:"))
        },
        crate::deps![],
    );
    (*id).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mount::{container_texts, render_now, test_root};
    use crate::primitives::{Component, Element, Props};
    use crate::types::Value;

    fn int(props: &crate::primitives::Props, name: &str) -> i64 {
        props.get(name).and_then(Value::as_int).unwrap_or_default()
    }

    #[test]
    fn test_memo_recomputes_on_dep_change() {
        let computed = Rc::new(Cell::new(0));
        let app = {
            let computed = computed.clone();
            Component::new("Doubler", move |props| {
                let n = int(props, "n");
                let computed = computed.clone();
                let doubled = use_memo(
                    move || {
                        computed.set(computed.get() + 1);
                        n * 2
                    },
                    crate::deps![n],
                );
                Ok(Element::text(doubled.to_string()))
            })
        };
        let element = |n: i64, m: i64| Element::component(&app, Props::new().with("n", n).with("m", m));

        let (root, _) = test_root();
        render_now(&root, element(1, 1));
        render_now(&root, element(1, 2));
        assert_eq!(computed.get(), 1);
        assert_eq!(container_texts(&root), vec!["2"]);

        render_now(&root, element(3, 2));
        assert_eq!(computed.get(), 2);
        assert_eq!(container_texts(&root), vec!["6"]);
    }

    #[test]
    fn test_ref_persists_across_renders() {
        let app = Component::new("Renders", |_| {
            let renders = use_ref(|| 0u32);
            *renders.borrow_mut() += 1;
            let n = *renders.borrow();
            Ok(Element::text(n.to_string()))
        });

        let (root, _) = test_root();
        for _ in 0..3 {
            render_now(&root, Element::component(&app, Props::new()));
        }
        assert_eq!(container_texts(&root), vec!["3"]);
    }

    #[test]
    fn test_callback_identity_follows_deps() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let app = {
            let seen = seen.clone();
            Component::new("Callback", move |props| {
                let n = int(props, "n");
                let callback = use_callback(move || n, crate::deps![n]);
                seen.borrow_mut().push(Rc::as_ptr(&callback) as usize);
                Ok(Element::Empty)
            })
        };

        let (root, _) = test_root();
        for n in [1, 1, 2] {
            render_now(&root, Element::component(&app, Props::new().with("n", n)));
        }
        let seen = seen.borrow();
        assert_eq!(seen[0], seen[1]);
        assert_ne!(seen[1], seen[2]);
    }

    #[test]
    fn test_ids_stable_and_distinct() {
        let app = Component::new("Id", |_| Ok(Element::text(use_id())));
        let tree = || {
            Element::fragment([
                Element::component(&app, Props::new()).key(1),
                Element::component(&app, Props::new()).key(2),
            ])
        };

        let (root, _) = test_root();
        render_now(&root, tree());
        let first = container_texts(&root);
        assert_ne!(first[0], first[1]);
        assert!(first[0].starts_with(":r"));

        render_now(&root, tree());
        assert_eq!(container_texts(&root), first);
    }
}
