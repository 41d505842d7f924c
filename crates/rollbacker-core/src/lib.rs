//! rollbacker-core — shared types and configuration for the rollbacker
//! supervisor.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here: the managed [`ContainerIdentity`], the opaque [`ImageReference`],
//! the two-valued [`HealthStatus`] and the fixed [`PortMapping`] used when a
//! container is redeployed. [`SupervisorConfig`] is resolved once at startup
//! and handed by reference to each component.

pub mod config;
pub mod types;

pub use config::{ConfigError, ConfigFile, SupervisorConfig, parse_duration};
pub use types::*;
