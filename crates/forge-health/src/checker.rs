//! Health probe logic.
//!
//! Performs HTTP health checks against replica endpoints and smooths the
//! results with consecutive-count thresholds.

use serde::Serialize;
use tracing::{debug, warn};

use crate::check::HealthCheck;

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeResult {
    /// The health path returned the expected status.
    Healthy,
    /// The health path returned any other status.
    Unhealthy,
    /// The probe could not be executed (connection error or timeout).
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Registered, not yet proven healthy.
    Unknown,
    Healthy,
    Unhealthy,
}

/// Tracks consecutive probe results for a single replica.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    status: HealthStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    unhealthy_threshold: u32,
    healthy_threshold: u32,
}

impl HealthTracker {
    pub fn new(check: &HealthCheck) -> Self {
        Self::with_thresholds(check.unhealthy_threshold, check.healthy_threshold)
    }

    pub fn with_thresholds(unhealthy_threshold: u32, healthy_threshold: u32) -> Self {
        Self {
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            consecutive_successes: 0,
            unhealthy_threshold: unhealthy_threshold.max(1),
            healthy_threshold: healthy_threshold.max(1),
        }
    }

    /// Record a probe result and return the new health status.
    pub fn record(&mut self, result: ProbeResult) -> HealthStatus {
        match result {
            ProbeResult::Healthy => {
                self.consecutive_failures = 0;
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.healthy_threshold {
                    if self.status != HealthStatus::Healthy {
                        debug!(successes = self.consecutive_successes, "replica healthy");
                    }
                    self.status = HealthStatus::Healthy;
                }
            }
            ProbeResult::Unhealthy | ProbeResult::Failed => {
                self.consecutive_successes = 0;
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.unhealthy_threshold {
                    if self.status != HealthStatus::Unhealthy {
                        warn!(
                            failures = self.consecutive_failures,
                            threshold = self.unhealthy_threshold,
                            "replica marked unhealthy"
                        );
                    }
                    self.status = HealthStatus::Unhealthy;
                }
            }
        }
        self.status
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Probe `address` with `check`.
///
/// Returns `Healthy` only when the response status equals
/// `check.expected_status`, `Unhealthy` for any other status, and
/// `Failed` if the connection fails or the check times out.
pub async fn http_probe(address: &str, check: &HealthCheck) -> ProbeResult {
    let uri = format!("http://{address}{}", check.path);

    let result = tokio::time::timeout(check.timeout, async {
        let stream = match tokio::net::TcpStream::connect(address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "health probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "health probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let request = match http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "forge-health/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, %uri, "invalid health probe request");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(request).await {
            Ok(resp) if resp.status().as_u16() == check.expected_status => ProbeResult::Healthy,
            Ok(resp) => {
                debug!(
                    status = %resp.status(),
                    expected = check.expected_status,
                    %uri,
                    "health probe status mismatch"
                );
                ProbeResult::Unhealthy
            }
            Err(e) => {
                debug!(error = %e, %uri, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%uri, "health probe timed out");
            ProbeResult::Failed
        }
    }
}
