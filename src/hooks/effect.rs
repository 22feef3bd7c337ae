//! Effect hooks.
//!
//! Effects are queued during render and run by the commit engine:
//! - insertion effects first, synchronously after host mutations
//! - layout effects next, synchronously, children before parents
//! - passive effects last, as one task on the deferred lane
//!
//! A changed effect's previous teardown runs immediately before its new
//! create callback. Every teardown runs when the node is deleted.

use crate::primitives::{Cleanup, NodeRef, PublicInstance};
use crate::types::{Deps, HookFlags};

use super::frame::with_frame;

fn push_effect(kind: HookFlags, create: impl FnOnce() -> Option<Cleanup> + 'static, deps: Deps) {
    with_frame(|frame| frame.push_effect(kind, Box::new(create), deps));
}

/// Passive effect, run after the commit on the deferred lane.
pub fn use_effect(create: impl FnOnce() -> Option<Cleanup> + 'static, deps: Deps) {
    push_effect(HookFlags::PASSIVE, create, deps);
}

/// Layout effect, run synchronously at the end of the commit.
pub fn use_layout_effect(create: impl FnOnce() -> Option<Cleanup> + 'static, deps: Deps) {
    push_effect(HookFlags::LAYOUT, create, deps);
}

/// Insertion effect, run before refs are attached and layout effects fire.
pub fn use_insertion_effect(create: impl FnOnce() -> Option<Cleanup> + 'static, deps: Deps) {
    push_effect(HookFlags::INSERTION, create, deps);
}

/// Expose a custom value through `node_ref` instead of a host instance.
pub fn use_imperative_handle(
    node_ref: &NodeRef,
    init: impl FnOnce() -> PublicInstance + 'static,
    deps: Deps,
) {
    let node_ref = node_ref.clone();
    use_layout_effect(
        move || {
            node_ref.apply(Some(init()));
            Some(Box::new(move || node_ref.apply(None)))
        },
        deps,
    );
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::pipeline::mount::{render_now, test_root};
    use crate::primitives::{Component, Element, Props, RefObject};
    use crate::types::Value;

    type Log = Rc<RefCell<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.borrow_mut().push(entry.into());
    }

    #[test]
    fn test_effect_reruns_when_deps_change() {
        let log: Log = Rc::default();
        let app = {
            let log = log.clone();
            Component::new("Watcher", move |props| {
                let n = props.get("n").and_then(Value::as_int).unwrap_or_default();
                let log = log.clone();
                use_effect(
                    move || {
                        push(&log, format!("create {n}"));
                        Some(Box::new(move || push(&log, format!("destroy {n}"))) as Cleanup)
                    },
                    crate::deps![n],
                );
                Ok(Element::Empty)
            })
        };
        let element = |n: i64| Element::component(&app, Props::new().with("n", n));

        let (root, _) = test_root();
        render_now(&root, element(1));
        render_now(&root, element(1));
        render_now(&root, element(2));
        assert_eq!(*log.borrow(), vec!["create 1", "destroy 1", "create 2"]);

        render_now(&root, Element::Empty);
        assert_eq!(log.borrow().last().map(String::as_str), Some("destroy 2"));
    }

    #[test]
    fn test_effect_without_deps_runs_every_commit() {
        let runs = Rc::new(RefCell::new(0));
        let app = {
            let runs = runs.clone();
            Component::new("Always", move |_| {
                let runs = runs.clone();
                use_layout_effect(
                    move || {
                        *runs.borrow_mut() += 1;
                        None
                    },
                    None,
                );
                Ok(Element::Empty)
            })
        };

        let (root, _) = test_root();
        for _ in 0..3 {
            render_now(&root, Element::component(&app, Props::new()));
        }
        assert_eq!(*runs.borrow(), 3);
    }

    #[test]
    fn test_effect_phases_in_order() {
        let log: Log = Rc::default();
        let app = {
            let log = log.clone();
            Component::new("Phases", move |_| {
                let (a, b, c) = (log.clone(), log.clone(), log.clone());
                use_effect(move || { push(&a, "passive"); None }, crate::deps![]);
                use_layout_effect(move || { push(&b, "layout"); None }, crate::deps![]);
                use_insertion_effect(move || { push(&c, "insertion"); None }, crate::deps![]);
                Ok(Element::host("box"))
            })
        };

        let (root, _) = test_root();
        render_now(&root, Element::component(&app, Props::new()));
        assert_eq!(*log.borrow(), vec!["insertion", "layout", "passive"]);
    }

    #[test]
    fn test_layout_effect_sees_attached_ref() {
        let seen = Rc::new(RefCell::new(None));
        let app = {
            let seen = seen.clone();
            Component::new("Measure", move |_| {
                let node_ref = crate::hooks::use_ref_object();
                let (seen, observed) = (seen.clone(), node_ref.clone());
                use_layout_effect(
                    move || {
                        *seen.borrow_mut() = Some(observed.is_set());
                        None
                    },
                    crate::deps![],
                );
                Ok(Element::host("canvas").with_ref(node_ref))
            })
        };

        let (root, _) = test_root();
        render_now(&root, Element::component(&app, Props::new()));
        assert_eq!(*seen.borrow(), Some(true));
    }

    #[test]
    fn test_imperative_handle_exposes_value() {
        let handle = RefObject::new();
        let app = {
            let node_ref = NodeRef::from(handle.clone());
            Component::new("Imperative", move |_| {
                use_imperative_handle(&node_ref, || Rc::new(42i32) as PublicInstance, crate::deps![]);
                Ok(Element::Empty)
            })
        };

        let (root, _) = test_root();
        render_now(&root, Element::component(&app, Props::new()));
        assert_eq!(handle.get::<i32>().as_deref(), Some(&42));

        render_now(&root, Element::Empty);
        assert!(!handle.is_set());
    }
}
