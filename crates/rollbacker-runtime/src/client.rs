//! The runtime operations the supervisor consumes.

use std::future::Future;
use std::pin::Pin;

use rollbacker_core::{ContainerIdentity, ImageReference, PortMapping};

use crate::error::RuntimeResult;

/// Boxed future alias for runtime operations.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = RuntimeResult<T>> + Send + 'a>>;

/// A live container, looked up fresh every cycle.
///
/// Never cache a handle across cycles: a rollback replaces the container
/// behind the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Runtime-assigned container ID.
    pub id: String,
    pub name: ContainerIdentity,
    /// ID of the image the container was created from.
    pub image_id: Option<String>,
    /// Whether the runtime deletes the container once it exits.
    pub auto_remove: bool,
}

/// Everything needed to start a replacement container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: ImageReference,
    pub name: ContainerIdentity,
    pub ports: PortMapping,
    pub auto_remove: bool,
}

/// Container runtime operations — injected for testability.
pub trait ContainerRuntime: Send + Sync {
    /// Look a container up by name. A missing container is `Ok(None)`.
    fn find<'a>(
        &'a self,
        identity: &'a ContainerIdentity,
    ) -> RuntimeFuture<'a, Option<ContainerHandle>>;

    /// Gracefully stop a running container.
    ///
    /// On success the container's name is free for a new container.
    fn stop<'a>(&'a self, handle: &'a ContainerHandle) -> RuntimeFuture<'a, ()>;

    /// Create and start a detached container. Returns the new container's
    /// ID without waiting for the application inside to become ready.
    fn run_detached<'a>(&'a self, spec: &'a RunSpec) -> RuntimeFuture<'a, String>;

    /// Primary tag of the container's image. Untagged images yield `None`.
    fn current_image_tag<'a>(
        &'a self,
        handle: &'a ContainerHandle,
    ) -> RuntimeFuture<'a, Option<ImageReference>>;
}
