//! Container runtime error types.

use thiserror::Error;

/// Errors that can occur while talking to the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unsupported host platform: {0}")]
    UnsupportedPlatform(String),

    #[error("failed to connect to container runtime: {0}")]
    Connect(String),

    #[error("failed to inspect {target}: {message}")]
    Inspect { target: String, message: String },

    #[error("failed to stop container {container}: {message}")]
    Stop { container: String, message: String },

    #[error("failed to remove container {container}: {message}")]
    Remove { container: String, message: String },

    #[error("failed to create container {container} from {image}: {message}")]
    Create {
        container: String,
        image: String,
        message: String,
    },

    #[error("failed to start container {container}: {message}")]
    Start { container: String, message: String },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
