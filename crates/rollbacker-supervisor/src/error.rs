//! Rollback error types.

use rollbacker_runtime::RuntimeError;
use rollbacker_state::StateError;
use thiserror::Error;

/// Reasons a rollback did not complete.
#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("failed to read good-image record: {0}")]
    Store(#[from] StateError),

    /// The unhealthy container could not be stopped; nothing was started.
    #[error("stop failed, replacement not started: {0}")]
    Stop(#[source] RuntimeError),

    /// The container was stopped but the replacement did not start.
    #[error("replacement failed to start: {0}")]
    Run(#[source] RuntimeError),
}
