//! Suspense Example - Pending data and error boundaries
//!
//! This example demonstrates:
//! - A component suspending on a pending handle
//! - The suspense fallback being replaced once the handle resolves
//! - An error boundary rendering its fallback for a failing child
//!
//! Run with: cargo run --example suspense

use spark_reconciler::{
    create_root, pending, BoundaryConfig, Component, ComponentError, Element, MemoryContainer, MemoryHost,
    Props, Scheduler,
};

fn print_tree(root: &spark_reconciler::Root<MemoryHost>) {
    root.with_host(|_, container| {
        for node in container.snapshot() {
            println!("  {node:?}");
        }
    });
}

fn main() -> Result<(), spark_reconciler::ReconcileError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    println!("=== spark-reconciler Suspense Example ===\n");

    let (profile, resolver) = pending();
    let profile_view = Component::new("Profile", move |_| {
        profile.suspend()?;
        Ok(Element::host("profile").attr("name", "Ada"))
    });
    let broken = Component::new("Broken", |_| Err(ComponentError::new("no data source").into()));

    let boundary = BoundaryConfig::new()
        .fallback(|error| Element::host("error").attr("message", error.message()))
        .on_catch(|error| println!("  boundary caught: {error}"));

    let app = Element::fragment([
        Element::suspense(
            Element::host("spinner"),
            Element::component(&profile_view, Props::new()),
        ),
        Element::error_boundary(boundary, Element::component(&broken, Props::new())),
    ]);

    let scheduler = Scheduler::default();
    let root = create_root(MemoryHost::new(), MemoryContainer::new(), &scheduler);

    println!("Initial render:");
    root.act(|| root.render(app))??;
    print_tree(&root);

    println!("\nAfter the profile resolves:");
    root.act(|| resolver.resolve())?;
    print_tree(&root);

    Ok(())
}
