//! Supervisor loop — locate, probe, record or roll back, sleep.

use std::sync::Arc;
use std::time::Duration;

use rollbacker_core::{ContainerIdentity, HealthStatus, ImageReference, SupervisorConfig};
use rollbacker_health::HealthCheck;
use rollbacker_runtime::{ContainerHandle, ContainerRuntime};
use rollbacker_state::GoodImageStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::executor::{RollbackExecutor, RollbackOutcome};

/// How a single supervisor cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No container with the managed name exists.
    ContainerMissing,
    /// The runtime could not be asked about the container.
    LookupFailed,
    /// Healthy; this image is now the recorded good image.
    RecordedGood(ImageReference),
    /// Healthy, but the image carries no tag to record.
    HealthyUntagged,
    /// Healthy, but the image's tags could not be read.
    TagLookupFailed,
    /// Healthy, but writing the good-image record failed.
    StoreFailed,
    /// Unhealthy; replaced with this image.
    RolledBack(ImageReference),
    /// Unhealthy, but no good image is recorded. Container left as-is.
    RollbackSkipped,
    /// Unhealthy, and the rollback failed part-way or before starting.
    RollbackFailed,
}

/// Self-healing supervisor for one named container.
pub struct Supervisor {
    identity: ContainerIdentity,
    interval: Duration,
    runtime: Arc<dyn ContainerRuntime>,
    prober: Arc<dyn HealthCheck>,
    store: GoodImageStore,
    executor: RollbackExecutor,
}

impl Supervisor {
    pub fn new(
        config: &SupervisorConfig,
        runtime: Arc<dyn ContainerRuntime>,
        prober: Arc<dyn HealthCheck>,
    ) -> Self {
        let store = GoodImageStore::open(&config.state_file);
        let executor = RollbackExecutor::from_config(config, runtime.clone(), store.clone());
        Self {
            identity: config.container.clone(),
            interval: config.check_interval,
            runtime,
            prober,
            store,
            executor,
        }
    }

    /// Run cycles every `check_interval` until `shutdown` flips to true
    /// (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            container = %self.identity,
            interval = ?self.interval,
            state_file = ?self.store.path(),
            "supervisor loop starting"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.run_once().await;
            debug!(container = %self.identity, ?outcome, "cycle finished");

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(container = %self.identity, "supervisor loop stopped");
    }

    /// Run a single cycle without sleeping.
    pub async fn run_once(&self) -> CycleOutcome {
        // The handle is fetched fresh every cycle; a rollback replaces the
        // container behind the name.
        let handle = match self.runtime.find(&self.identity).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                warn!(container = %self.identity, "container not found, waiting");
                return CycleOutcome::ContainerMissing;
            }
            Err(e) => {
                error!(container = %self.identity, error = %e, "container lookup failed");
                return CycleOutcome::LookupFailed;
            }
        };

        match self.prober.check().await {
            HealthStatus::Healthy => self.record_good(&handle).await,
            HealthStatus::Unhealthy => {
                warn!(container = %self.identity, id = %handle.id, "container failed health check");
                self.roll_back(&handle).await
            }
        }
    }

    async fn record_good(&self, handle: &ContainerHandle) -> CycleOutcome {
        let image = match self.runtime.current_image_tag(handle).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                info!(
                    container = %self.identity,
                    "container healthy, image has no tag to record"
                );
                return CycleOutcome::HealthyUntagged;
            }
            Err(e) => {
                error!(container = %self.identity, error = %e, "failed to read image tag");
                return CycleOutcome::TagLookupFailed;
            }
        };

        match self.store.save(&self.identity, &image) {
            Ok(()) => {
                info!(container = %self.identity, %image, "container healthy, recorded good image");
                CycleOutcome::RecordedGood(image)
            }
            Err(e) => {
                error!(container = %self.identity, %image, error = %e, "failed to record good image");
                CycleOutcome::StoreFailed
            }
        }
    }

    async fn roll_back(&self, handle: &ContainerHandle) -> CycleOutcome {
        match self.executor.rollback(handle).await {
            Ok(RollbackOutcome::RolledBack(image)) => CycleOutcome::RolledBack(image),
            Ok(RollbackOutcome::NoGoodImage) => CycleOutcome::RollbackSkipped,
            Err(e) => {
                error!(container = %self.identity, error = %e, "rollback failed");
                CycleOutcome::RollbackFailed
            }
        }
    }
}
