//! Health check probe logic.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rollbacker_core::{HealthStatus, SupervisorConfig};
use tracing::debug;

/// Boxed future alias for health checks.
pub type HealthFuture<'a> = Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;

/// Something that can classify the managed application as healthy or not.
///
/// Implementations must be total: failures fold into `Unhealthy`.
pub trait HealthCheck: Send + Sync {
    fn check(&self) -> HealthFuture<'_>;
}

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint answered 200.
    Healthy,
    /// The endpoint answered with any other status.
    Unhealthy,
    /// No usable response: bad URL, connection error, timeout, protocol error.
    Failed,
}

impl From<ProbeResult> for HealthStatus {
    fn from(result: ProbeResult) -> Self {
        match result {
            ProbeResult::Healthy => HealthStatus::Healthy,
            ProbeResult::Unhealthy | ProbeResult::Failed => HealthStatus::Unhealthy,
        }
    }
}

/// Probes a fixed HTTP URL.
#[derive(Debug, Clone)]
pub struct HttpProber {
    url: String,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.health_url.clone(), config.probe_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HealthCheck for HttpProber {
    fn check(&self) -> HealthFuture<'_> {
        Box::pin(async move { HealthStatus::from(http_probe(&self.url, self.timeout).await) })
    }
}

/// Perform one HTTP health probe against `url`.
///
/// Returns `Healthy` only for status 200, `Unhealthy` for any other status,
/// and `Failed` if no response could be obtained within `timeout`.
pub async fn http_probe(url: &str, timeout: Duration) -> ProbeResult {
    let uri: http::Uri = match url.parse() {
        Ok(uri) => uri,
        Err(e) => {
            debug!(error = %e, %url, "health probe url is malformed");
            return ProbeResult::Failed;
        }
    };

    if uri.scheme_str() != Some("http") {
        debug!(%url, "health probe only supports http");
        return ProbeResult::Failed;
    }
    let Some(authority) = uri.authority().cloned() else {
        debug!(%url, "health probe url has no host");
        return ProbeResult::Failed;
    };
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
    // Userinfo never goes on the wire.
    let host_header = match authority.port() {
        Some(port) => format!("{}:{}", authority.host(), port),
        None => authority.host().to_string(),
    };
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(&address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %url, "health probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %url, "health probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(path.as_str())
            .header("host", host_header.as_str())
            .header("user-agent", "rollbacker/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %url, "health probe request could not be built");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status() == http::StatusCode::OK => ProbeResult::Healthy,
            Ok(resp) => {
                debug!(status = %resp.status(), %url, "health probe non-200");
                ProbeResult::Unhealthy
            }
            Err(e) => {
                debug!(error = %e, %url, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%url, ?timeout, "health probe timed out");
            ProbeResult::Failed
        }
    }
}
