//! rollbacker-health — HTTP health probing for the supervised container.
//!
//! A probe is one `GET` against a fixed URL, bounded by a timeout. The
//! container is healthy only if the endpoint answers `200 OK`; every other
//! outcome (non-200 status, refused connection, timeout, garbage on the
//! wire, even an unparseable URL) is unhealthy.
//!
//! The probe never returns an error. This catch-all is confined to this
//! crate: every other component propagates its failures.

pub mod checker;

pub use checker::{HealthCheck, HealthFuture, HttpProber, ProbeResult, http_probe};
