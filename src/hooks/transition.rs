//! Deferred-lane hooks and external stores.
//!
//! - [`use_transition`] - run updates on the deferred lane with a pending flag
//! - [`use_deferred_value`] - lag a value behind by one deferred render
//! - [`use_sync_external_store`] - subscribe to state owned outside the tree

use std::rc::Rc;

use crate::pipeline::Scheduler;
use crate::primitives::Cleanup;
use crate::types::Value;

use super::effect::{use_effect, use_layout_effect};
use super::frame::with_frame;
use super::memo::use_ref;
use super::state::{use_force_update, use_state, SetState};

fn current_scheduler() -> Scheduler {
    with_frame(|frame| frame.scheduler.clone())
}

// =============================================================================
// Transitions
// =============================================================================

/// Starter returned by [`use_transition`].
#[derive(Clone)]
pub struct StartTransition {
    scheduler: Scheduler,
    set_pending: SetState<bool>,
}

impl StartTransition {
    /// Flag the transition as pending now, then run `work` on the deferred
    /// lane. Updates dispatched inside `work` render on that lane too.
    pub fn start(&self, work: impl FnOnce() + 'static) {
        self.set_pending.set(true);
        let set_pending = self.set_pending.clone();
        self.scheduler.start_transition(move || {
            set_pending.set(false);
            work();
        });
    }
}

pub fn use_transition() -> (bool, StartTransition) {
    let (is_pending, set_pending) = use_state(|| false);
    let starter = StartTransition {
        scheduler: current_scheduler(),
        set_pending,
    };
    (is_pending, starter)
}

/// Returns the previous `value` until a deferred render catches up.
pub fn use_deferred_value<T: Clone + PartialEq + 'static>(value: T) -> T {
    let (deferred, set_deferred) = use_state(|| value.clone());
    let scheduler = current_scheduler();
    let shown = deferred.clone();
    use_effect(
        move || {
            if value != shown {
                scheduler.start_transition(move || set_deferred.set(value));
            }
            None
        },
        None,
    );
    deferred
}

// =============================================================================
// External stores
// =============================================================================

/// State owned outside the component tree.
pub trait ExternalStore<T> {
    /// Register `on_change`; the returned cleanup unsubscribes.
    fn subscribe(&self, on_change: Rc<dyn Fn()>) -> Cleanup;

    fn snapshot(&self) -> T;
}

/// Read `store` and re-render whenever its snapshot changes.
pub fn use_sync_external_store<T, S>(store: &Rc<S>) -> T
where
    T: Clone + PartialEq + 'static,
    S: ExternalStore<T> + 'static,
{
    let snapshot = store.snapshot();
    let force = use_force_update();
    let last = use_ref(|| snapshot.clone());

    let rendered = snapshot.clone();
    let last_for_commit = last.clone();
    use_layout_effect(
        move || {
            *last_for_commit.borrow_mut() = rendered;
            None
        },
        None,
    );

    let subscribed = store.clone();
    use_layout_effect(
        move || {
            let check: Rc<dyn Fn()> = {
                let store = subscribed.clone();
                Rc::new(move || {
                    if store.snapshot() != *last.borrow() {
                        force.trigger();
                    }
                })
            };
            let unsubscribe = subscribed.subscribe(check.clone());
            // Catch changes made between render and subscription
            check();
            Some(unsubscribe)
        },
        crate::deps![Value::from(store.clone())],
    );

    snapshot
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::pipeline::mount::{container_texts, render_now, test_root};
    use crate::primitives::{Component, Element, Props};

    type Log = Rc<RefCell<Vec<String>>>;

    fn record(log: &Log, entry: String) {
        let log = log.clone();
        use_layout_effect(
            move || {
                log.borrow_mut().push(entry);
                None
            },
            None,
        );
    }

    #[test]
    fn test_transition_pending_then_settled() {
        let log: Log = Rc::default();
        let slot: Rc<RefCell<Option<(StartTransition, SetState<i64>)>>> = Rc::default();
        let app = {
            let (log, slot) = (log.clone(), slot.clone());
            Component::new("Search", move |_| {
                let (value, set_value) = use_state(|| 0i64);
                let (is_pending, start) = use_transition();
                *slot.borrow_mut() = Some((start, set_value));
                record(&log, format!("{is_pending}:{value}"));
                Ok(Element::Empty)
            })
        };

        let (root, _) = test_root();
        render_now(&root, Element::component(&app, Props::new()));
        let (start, set_value) = slot.borrow().clone().unwrap();
        root.act(|| start.start(move || set_value.set(5))).unwrap();
        assert_eq!(*log.borrow(), vec!["false:0", "true:0", "false:5"]);
    }

    #[test]
    fn test_deferred_value_lags_one_render() {
        let log: Log = Rc::default();
        let app = {
            let log = log.clone();
            Component::new("Lagging", move |props| {
                let n = props.get("n").and_then(Value::as_int).unwrap_or_default();
                let deferred = use_deferred_value(n);
                record(&log, format!("{n}/{deferred}"));
                Ok(Element::Empty)
            })
        };

        let (root, _) = test_root();
        render_now(&root, Element::component(&app, Props::new().with("n", 1)));
        render_now(&root, Element::component(&app, Props::new().with("n", 2)));
        assert_eq!(*log.borrow(), vec!["1/1", "2/1", "2/2"]);
    }

    #[derive(Default)]
    struct CounterStore {
        value: Cell<i64>,
        listeners: Rc<RefCell<Vec<Rc<dyn Fn()>>>>,
    }

    impl CounterStore {
        fn set(&self, value: i64) {
            self.value.set(value);
            let listeners = self.listeners.borrow().clone();
            for listener in listeners {
                listener();
            }
        }
    }

    impl ExternalStore<i64> for CounterStore {
        fn subscribe(&self, on_change: Rc<dyn Fn()>) -> Cleanup {
            self.listeners.borrow_mut().push(on_change);
            let listeners = self.listeners.clone();
            Box::new(move || listeners.borrow_mut().clear())
        }

        fn snapshot(&self) -> i64 {
            self.value.get()
        }
    }

    #[test]
    fn test_external_store_change_rerenders() {
        let store = Rc::new(CounterStore::default());
        let app = {
            let store = store.clone();
            Component::new("StoreView", move |_| {
                let value: i64 = use_sync_external_store(&store);
                Ok(Element::text(value.to_string()))
            })
        };

        let (root, _) = test_root();
        render_now(&root, Element::component(&app, Props::new()));
        assert_eq!(container_texts(&root), vec!["0"]);
        assert_eq!(store.listeners.borrow().len(), 1);

        root.act(|| store.set(7)).unwrap();
        assert_eq!(container_texts(&root), vec!["7"]);
        // Still one subscription after the re-render
        assert_eq!(store.listeners.borrow().len(), 1);

        render_now(&root, Element::Empty);
        assert!(store.listeners.borrow().is_empty());
    }

    #[test]
    fn test_store_unchanged_snapshot_skips_render() {
        let store = Rc::new(CounterStore::default());
        let renders = Rc::new(Cell::new(0));
        let app = {
            let (store, renders) = (store.clone(), renders.clone());
            Component::new("StoreView", move |_| {
                renders.set(renders.get() + 1);
                let _: i64 = use_sync_external_store(&store);
                Ok(Element::Empty)
            })
        };

        let (root, _) = test_root();
        render_now(&root, Element::component(&app, Props::new()));
        root.act(|| store.set(0)).unwrap();
        assert_eq!(renders.get(), 1);
    }
}
