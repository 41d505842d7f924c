//! rollbacker-supervisor — the self-healing control loop.
//!
//! # Architecture
//!
//! ```text
//! Supervisor (one cycle every check_interval)
//!   ├── ContainerRuntime::find(name)      → absent? log, sleep
//!   ├── HealthCheck::check()              → Healthy / Unhealthy
//!   ├── Healthy   → GoodImageStore::save(name, primary tag)
//!   └── Unhealthy → RollbackExecutor::rollback(handle)
//!                     ├── GoodImageStore::get(name) → none? skip
//!                     ├── ContainerRuntime::stop(handle)
//!                     └── ContainerRuntime::run_detached(good image)
//! ```
//!
//! Cycles run strictly one after another. Nothing fails the loop: each
//! cycle ends in a [`CycleOutcome`] that is logged, and the next cycle
//! starts after the fixed interval.

pub mod error;
pub mod executor;
pub mod supervisor;

pub use error::RollbackError;
pub use executor::{RollbackExecutor, RollbackOutcome};
pub use supervisor::{CycleOutcome, Supervisor};
