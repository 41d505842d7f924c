//! Docker Engine API implementation of [`ContainerRuntime`], via bollard.

use std::collections::HashMap;
use std::time::Duration;

use bollard::Docker;
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use rollbacker_core::{ContainerIdentity, ImageReference};
use tracing::{debug, info, warn};

use crate::client::{ContainerHandle, ContainerRuntime, RunSpec, RuntimeFuture};
use crate::error::{RuntimeError, RuntimeResult};
use crate::platform::{ConnectionPlan, HostPlatform};

/// Request timeout for the runtime API, in seconds.
const API_TIMEOUT_SECS: u64 = 120;

/// Grace period given to a container before the runtime kills it, in seconds.
const STOP_TIMEOUT_SECS: i32 = 10;

/// How long to wait for an auto-remove container to disappear after stop.
const DEFAULT_REMOVAL_WAIT: Duration = Duration::from_secs(10);
const REMOVAL_POLL: Duration = Duration::from_millis(250);

/// Tag the runtime reports for dangling images.
const UNTAGGED: &str = "<none>:<none>";

/// Container runtime backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    client: Docker,
    removal_wait: Duration,
}

impl DockerRuntime {
    /// Connect to the runtime the way `platform` dictates and verify the
    /// connection with a ping.
    pub async fn connect(platform: HostPlatform, docker_host: Option<&str>) -> RuntimeResult<Self> {
        let client = match platform.connection_plan(docker_host) {
            ConnectionPlan::LocalSocket => connect_local().await?,
            ConnectionPlan::Tcp(endpoint) => connect_tcp(&endpoint).await?,
            ConnectionPlan::LocalWithTcpFallback(endpoint) => match connect_local().await {
                Ok(client) => client,
                Err(e) => {
                    warn!(
                        %platform,
                        error = %e,
                        %endpoint,
                        "local runtime socket unavailable, switching to TCP"
                    );
                    connect_tcp(&endpoint).await?
                }
            },
        };
        info!(%platform, "connected to container runtime");
        Ok(Self::from_client(client))
    }

    /// Wrap an already-configured client.
    pub fn from_client(client: Docker) -> Self {
        Self {
            client,
            removal_wait: DEFAULT_REMOVAL_WAIT,
        }
    }

    async fn inspect(&self, identity: &ContainerIdentity) -> RuntimeResult<Option<ContainerHandle>> {
        match self
            .client
            .inspect_container(identity.as_str(), None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => {
                let auto_remove = details
                    .host_config
                    .as_ref()
                    .and_then(|hc| hc.auto_remove)
                    .unwrap_or(false);
                Ok(Some(ContainerHandle {
                    id: details.id.unwrap_or_else(|| identity.to_string()),
                    name: identity.clone(),
                    image_id: details.image,
                    auto_remove,
                }))
            }
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(RuntimeError::Inspect {
                target: identity.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn stop_container(&self, handle: &ContainerHandle) -> RuntimeResult<()> {
        let opts = StopContainerOptions {
            t: Some(STOP_TIMEOUT_SECS),
            signal: None,
        };

        match self.client.stop_container(&handle.id, Some(opts)).await {
            Ok(()) => debug!(container = %handle.name, id = %handle.id, "container stopped"),
            Err(DockerError::DockerResponseServerError {
                status_code: 304, ..
            }) => debug!(container = %handle.name, "container was already stopped"),
            Err(e) => {
                return Err(RuntimeError::Stop {
                    container: handle.name.to_string(),
                    message: e.to_string(),
                });
            }
        }

        // The name must be free before a replacement can be created.
        if handle.auto_remove {
            self.wait_until_removed(handle).await
        } else {
            self.remove_stopped(handle).await
        }
    }

    async fn remove_stopped(&self, handle: &ContainerHandle) -> RuntimeResult<()> {
        let opts = RemoveContainerOptions {
            force: false,
            ..Default::default()
        };
        match self.client.remove_container(&handle.id, Some(opts)).await {
            Ok(()) => Ok(()),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(RuntimeError::Remove {
                container: handle.name.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn wait_until_removed(&self, handle: &ContainerHandle) -> RuntimeResult<()> {
        let deadline = tokio::time::Instant::now() + self.removal_wait;
        loop {
            match self.inspect(&handle.name).await? {
                None => return Ok(()),
                Some(current) if current.id != handle.id => return Ok(()),
                Some(_) if tokio::time::Instant::now() >= deadline => {
                    return Err(RuntimeError::Remove {
                        container: handle.name.to_string(),
                        message: format!("still present {:?} after stop", self.removal_wait),
                    });
                }
                Some(_) => tokio::time::sleep(REMOVAL_POLL).await,
            }
        }
    }

    async fn create_and_start(&self, spec: &RunSpec) -> RuntimeResult<String> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            spec.ports.container_key(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.ports.host_port.to_string()),
            }]),
        );

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            auto_remove: Some(spec.auto_remove),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(spec.name.to_string()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(|e| RuntimeError::Create {
                container: spec.name.to_string(),
                image: spec.image.to_string(),
                message: e.to_string(),
            })?;

        self.client
            .start_container(&response.id, None::<StartContainerOptions>)
            .await
            .map_err(|e| RuntimeError::Start {
                container: spec.name.to_string(),
                message: e.to_string(),
            })?;

        info!(
            container = %spec.name,
            image = %spec.image,
            ports = %spec.ports,
            id = %response.id,
            "container started"
        );
        Ok(response.id)
    }

    async fn image_tag(&self, handle: &ContainerHandle) -> RuntimeResult<Option<ImageReference>> {
        let Some(image_id) = handle.image_id.as_deref() else {
            return Ok(None);
        };
        let image = self
            .client
            .inspect_image(image_id)
            .await
            .map_err(|e| RuntimeError::Inspect {
                target: image_id.to_string(),
                message: e.to_string(),
            })?;
        Ok(primary_tag(image.repo_tags.as_deref()))
    }
}

impl ContainerRuntime for DockerRuntime {
    fn find<'a>(
        &'a self,
        identity: &'a ContainerIdentity,
    ) -> RuntimeFuture<'a, Option<ContainerHandle>> {
        Box::pin(self.inspect(identity))
    }

    fn stop<'a>(&'a self, handle: &'a ContainerHandle) -> RuntimeFuture<'a, ()> {
        Box::pin(self.stop_container(handle))
    }

    fn run_detached<'a>(&'a self, spec: &'a RunSpec) -> RuntimeFuture<'a, String> {
        Box::pin(self.create_and_start(spec))
    }

    fn current_image_tag<'a>(
        &'a self,
        handle: &'a ContainerHandle,
    ) -> RuntimeFuture<'a, Option<ImageReference>> {
        Box::pin(self.image_tag(handle))
    }
}

/// First real tag of an image, skipping the runtime's dangling marker.
fn primary_tag(repo_tags: Option<&[String]>) -> Option<ImageReference> {
    repo_tags?
        .iter()
        .find(|tag| !tag.is_empty() && tag.as_str() != UNTAGGED)
        .map(|tag| ImageReference::new(tag.as_str()))
}

async fn connect_local() -> RuntimeResult<Docker> {
    let client = Docker::connect_with_local_defaults()
        .map_err(|e| RuntimeError::Connect(e.to_string()))?;
    ping(&client).await?;
    Ok(client)
}

async fn connect_tcp(endpoint: &str) -> RuntimeResult<Docker> {
    let client = Docker::connect_with_http(endpoint, API_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        .map_err(|e| RuntimeError::Connect(format!("{endpoint}: {e}")))?;
    ping(&client).await?;
    Ok(client)
}

async fn ping(client: &Docker) -> RuntimeResult<()> {
    client
        .ping()
        .await
        .map(|_| ())
        .map_err(|e| RuntimeError::Connect(e.to_string()))
}
