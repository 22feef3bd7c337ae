//! Counter Example - State, effects and time-sliced rendering
//!
//! This example demonstrates:
//! - A component with local state and a layout effect
//! - Batched updates dispatched from outside the tree
//! - A large keyed list rendered over several bounded flushes
//!
//! Run with: cargo run --example counter

use std::cell::RefCell;
use std::rc::Rc;

use spark_reconciler::{
    create_root, deps, use_layout_effect, use_state, Component, Element, MemoryContainer, MemoryHost, Props,
    SetState, UnitBudget,
};

fn main() -> Result<(), spark_reconciler::ReconcileError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    println!("=== spark-reconciler Counter Example ===\n");

    let setter: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();
    let counter = {
        let setter = setter.clone();
        Component::new("Counter", move |_| {
            let (count, set_count) = use_state(|| 0i64);
            *setter.borrow_mut() = Some(set_count);
            use_layout_effect(
                move || {
                    println!("  committed count = {count}");
                    None
                },
                deps![count],
            );
            Ok(Element::host("button").attr("count", count).child(format!("clicked {count} times")))
        })
    };

    let host = MemoryHost::new();
    let log = host.log();
    let scheduler = spark_reconciler::Scheduler::default();
    let root = create_root(host, MemoryContainer::new(), &scheduler);

    println!("Mount:");
    root.act(|| root.render(Element::component(&counter, Props::new())))??;
    println!("  host calls: {}", log.drain().len());

    println!("\nThree clicks, one render:");
    if let Some(set_count) = setter.borrow().clone() {
        root.act(|| {
            for _ in 0..3 {
                set_count.update(|n| n + 1);
            }
        })?;
    }
    for op in log.drain() {
        println!("  {op:?}");
    }

    println!("\nTime-sliced list:");
    let list = Element::host("list").children((0..200).map(|i| Element::host("row").key(i).attr("index", i)));
    root.render(Element::fragment([Element::component(&counter, Props::new()), list]))?;
    let mut flushes = 0;
    while !root.is_idle() {
        scheduler.flush(&mut UnitBudget::new(25))?;
        flushes += 1;
    }
    println!("  rendered in {flushes} flushes, {} commits total", root.commit_count());

    root.with_host(|_, container| {
        println!("\nFinal tree:");
        for node in container.snapshot() {
            println!("  <{}> with {} children", node.ty, node.children.len());
        }
    });

    Ok(())
}
