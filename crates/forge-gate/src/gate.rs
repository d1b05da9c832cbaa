//! The wait loop.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::env::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS, GateEnv};
use crate::error::{GateError, GateResult};
use crate::handoff::Handoff;
use crate::probe::{Probe, ProbeOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Waiting,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub state: GateState,
    /// Probes performed, including the successful one.
    pub attempts: u32,
    pub waited: Duration,
}

#[derive(Debug, Clone)]
pub struct ActivationGate {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, Some(DEFAULT_MAX_ATTEMPTS))
    }
}

impl ActivationGate {
    /// `max_attempts = None` waits forever.
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_env(env: &GateEnv) -> Self {
        Self::new(env.interval, env.max_attempts)
    }

    /// Probe until the dependency is reachable.
    ///
    /// Probes are spaced by a fixed interval. Every failed attempt is
    /// logged with its number. With a bound, the last failure turns into
    /// [`GateError::Exhausted`].
    pub async fn wait<P: Probe>(&self, probe: &P) -> GateResult<GateReport> {
        let started = Instant::now();
        let target = probe.target();
        let mut state = GateState::Waiting;
        let mut attempts = 0u32;

        info!(target = %target, interval = ?self.interval, max_attempts = ?self.max_attempts, "waiting for dependency");

        while state == GateState::Waiting {
            attempts += 1;
            match probe.probe().await {
                ProbeOutcome::Reachable => state = GateState::Ready,
                ProbeOutcome::Unreachable(reason) => {
                    match self.max_attempts {
                        Some(max) => warn!(target = %target, attempt = attempts, max, reason = %reason, "dependency not ready"),
                        None => warn!(target = %target, attempt = attempts, reason = %reason, "dependency not ready"),
                    }
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(GateError::Exhausted {
                            address: target,
                            attempts,
                            last_error: reason,
                        });
                    }
                    tokio::time::sleep(self.interval).await;
                }
            }
        }

        let waited = started.elapsed();
        info!(target = %target, attempts, waited = ?waited, "dependency ready");
        Ok(GateReport {
            state,
            attempts,
            waited,
        })
    }

    /// Wait, then hand off to `command`. The handoff runs only after the
    /// dependency is ready, and only once.
    pub async fn run<P: Probe, H: Handoff>(
        &self,
        probe: &P,
        handoff: &mut H,
        command: &[String],
    ) -> GateResult<GateReport> {
        if command.is_empty() {
            return Err(GateError::EmptyCommand);
        }
        let report = self.wait(probe).await?;
        handoff.handoff(command)?;
        Ok(report)
    }
}
