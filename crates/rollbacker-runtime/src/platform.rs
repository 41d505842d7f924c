//! Host platform detection and connection planning.

use std::fmt;

use crate::error::{RuntimeError, RuntimeResult};

/// TCP endpoint tried on Windows when the named pipe is unavailable.
pub const WINDOWS_TCP_FALLBACK: &str = "tcp://127.0.0.1:2375";

/// Host operating systems the supervisor knows how to reach a runtime on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    MacOs,
    Windows,
}

impl HostPlatform {
    /// Detect the platform this binary is running on.
    pub fn detect() -> RuntimeResult<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`.
    pub fn from_os(os: &str) -> RuntimeResult<Self> {
        match os {
            "linux" => Ok(HostPlatform::Linux),
            "macos" => Ok(HostPlatform::MacOs),
            "windows" => Ok(HostPlatform::Windows),
            other => Err(RuntimeError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Decide how to reach the runtime on this platform.
    pub fn connection_plan(self, docker_host: Option<&str>) -> ConnectionPlan {
        if let Some(host) = docker_host {
            return ConnectionPlan::Tcp(host.to_string());
        }
        match self {
            HostPlatform::Linux | HostPlatform::MacOs => ConnectionPlan::LocalSocket,
            HostPlatform::Windows => {
                ConnectionPlan::LocalWithTcpFallback(WINDOWS_TCP_FALLBACK.to_string())
            }
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPlatform::Linux => f.write_str("Linux"),
            HostPlatform::MacOs => f.write_str("macOS"),
            HostPlatform::Windows => f.write_str("Windows"),
        }
    }
}

/// How [`DockerRuntime::connect`](crate::DockerRuntime::connect) reaches the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionPlan {
    /// Platform-default local socket (unix socket or named pipe).
    LocalSocket,
    /// Local socket first; the given TCP endpoint if that fails.
    LocalWithTcpFallback(String),
    /// Explicit TCP endpoint only.
    Tcp(String),
}
