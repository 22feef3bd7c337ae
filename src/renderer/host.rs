//! Host adapter contract.
//!
//! The engine never mutates a UI directly. Every structural change goes
//! through a [`HostConfig`] implementation: create instances during the work
//! loop, then insert/remove/update them during the commit.
//!
//! Instances are handles (`Clone`) owned by exactly one work node; clones
//! held by the current and work-in-progress generations refer to the same
//! backend object.

use crate::error::HostError;
use crate::primitives::{Props, PublicInstance};

pub type HostResult<T> = Result<T, HostError>;

/// Operations the engine calls to materialize changes.
///
/// Container variants are used when the nearest host parent of a node is the
/// root itself.
pub trait HostConfig {
    /// Root container the tree is rendered into.
    type Container;
    /// Element or text instance handle.
    type Instance: Clone;
    /// Precomputed update description returned by [`prepare_update`].
    ///
    /// [`prepare_update`]: HostConfig::prepare_update
    type UpdatePayload;

    fn create_instance(&mut self, ty: &str, props: &Props) -> HostResult<Self::Instance>;

    fn create_text_instance(&mut self, text: &str) -> HostResult<Self::Instance>;

    /// Called once after an instance is created. Returning `true` requests a
    /// [`commit_mount`](HostConfig::commit_mount) after its first insertion.
    fn finalize_initial_children(
        &mut self,
        _instance: &Self::Instance,
        _ty: &str,
        _props: &Props,
    ) -> bool {
        false
    }

    fn append_child(&mut self, parent: &Self::Instance, child: &Self::Instance) -> HostResult<()>;

    fn insert_before(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
        before: &Self::Instance,
    ) -> HostResult<()>;

    fn remove_child(&mut self, parent: &Self::Instance, child: &Self::Instance) -> HostResult<()>;

    fn append_child_to_container(
        &mut self,
        container: &mut Self::Container,
        child: &Self::Instance,
    ) -> HostResult<()>;

    fn insert_in_container_before(
        &mut self,
        container: &mut Self::Container,
        child: &Self::Instance,
        before: &Self::Instance,
    ) -> HostResult<()>;

    fn remove_child_from_container(
        &mut self,
        container: &mut Self::Container,
        child: &Self::Instance,
    ) -> HostResult<()>;

    /// Compute an update payload, `None` when nothing changed.
    fn prepare_update(
        &mut self,
        instance: &Self::Instance,
        ty: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<Self::UpdatePayload>;

    fn commit_update(
        &mut self,
        instance: &Self::Instance,
        payload: Self::UpdatePayload,
        ty: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> HostResult<()>;

    fn commit_text_update(
        &mut self,
        instance: &Self::Instance,
        old_text: &str,
        new_text: &str,
    ) -> HostResult<()>;

    /// Value exposed to refs.
    fn get_public_instance(&self, instance: &Self::Instance) -> Option<PublicInstance>;

    /// Invoked once per newly placed instance whose finalize step asked for it.
    fn commit_mount(&mut self, _instance: &Self::Instance, _ty: &str, _props: &Props) -> HostResult<()> {
        Ok(())
    }

    /// Called before the first mutation of a commit.
    fn prepare_for_commit(&mut self, _container: &mut Self::Container) {}

    /// Called after the last mutation of a commit.
    fn reset_after_commit(&mut self, _container: &mut Self::Container) {}
}
