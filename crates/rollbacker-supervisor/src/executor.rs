//! Rollback executor — replaces an unhealthy container with its last good image.

use std::sync::Arc;

use rollbacker_core::{ContainerIdentity, ImageReference, PortMapping, SupervisorConfig};
use rollbacker_runtime::{ContainerHandle, ContainerRuntime, RunSpec};
use rollbacker_state::GoodImageStore;
use tracing::{info, warn};

use crate::error::RollbackError;

/// What a rollback attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The container was stopped and restarted from this image.
    RolledBack(ImageReference),
    /// Nothing recorded for the container; no runtime calls were made.
    NoGoodImage,
}

/// Stops an unhealthy container and redeploys the last good image under
/// the same name and port binding.
pub struct RollbackExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    store: GoodImageStore,
    identity: ContainerIdentity,
    ports: PortMapping,
}

impl RollbackExecutor {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: GoodImageStore,
        identity: ContainerIdentity,
        ports: PortMapping,
    ) -> Self {
        Self {
            runtime,
            store,
            identity,
            ports,
        }
    }

    pub fn from_config(
        config: &SupervisorConfig,
        runtime: Arc<dyn ContainerRuntime>,
        store: GoodImageStore,
    ) -> Self {
        Self::new(runtime, store, config.container.clone(), config.ports)
    }

    /// Roll `handle` back to the last good image.
    ///
    /// Exactly one stop followed by exactly one run. If the stop fails the
    /// run is never attempted. Health is not re-checked here.
    pub async fn rollback(
        &self,
        handle: &ContainerHandle,
    ) -> Result<RollbackOutcome, RollbackError> {
        let Some(image) = self.store.get(&self.identity)? else {
            warn!(container = %self.identity, "no good image recorded, cannot rollback");
            return Ok(RollbackOutcome::NoGoodImage);
        };

        info!(container = %self.identity, %image, "rolling back");

        self.runtime.stop(handle).await.map_err(RollbackError::Stop)?;

        let spec = RunSpec {
            image: image.clone(),
            name: self.identity.clone(),
            ports: self.ports,
            auto_remove: true,
        };
        let id = self
            .runtime
            .run_detached(&spec)
            .await
            .map_err(RollbackError::Run)?;

        info!(container = %self.identity, %image, %id, "rollback complete");
        Ok(RollbackOutcome::RolledBack(image))
    }
}
