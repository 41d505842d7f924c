//! rollbacker-runtime — the supervisor's view of the container runtime.
//!
//! Only four operations are consumed: look a container up by name, stop
//! it, run a new detached container, and read the primary tag of a
//! container's image. They are expressed by the [`ContainerRuntime`] trait
//! so the supervisor can be driven against a recording runtime in tests.
//!
//! # Connection
//!
//! [`DockerRuntime::connect`] resolves the connection once at startup:
//!
//! ```text
//! docker_host set      → TCP endpoint
//! Linux / macOS        → local unix socket
//! Windows              → named pipe, falling back to tcp://127.0.0.1:2375
//! anything else        → UnsupportedPlatform (fatal)
//! ```

pub mod client;
pub mod docker;
pub mod error;
pub mod platform;

pub use client::{ContainerHandle, ContainerRuntime, RunSpec, RuntimeFuture};
pub use docker::DockerRuntime;
pub use error::{RuntimeError, RuntimeResult};
pub use platform::{ConnectionPlan, HostPlatform, WINDOWS_TCP_FALLBACK};
