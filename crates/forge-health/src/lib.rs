//! forge-health — the load balancer's health-check contract.
//!
//! A replica is healthy when its health path answers with exactly the
//! expected status. Single probe results are smoothed by a
//! [`HealthTracker`]: `unhealthy_threshold` consecutive failures take a
//! replica out of rotation, `healthy_threshold` consecutive successes
//! bring it back.
//!
//! # Architecture
//!
//! ```text
//! HealthCheck (from the stack file's HealthCheckSpec)
//!   ├── http_probe(address, check) → ProbeResult
//!   └── HealthTracker::record(result) → HealthStatus
//! ```

pub mod check;
pub mod checker;

pub use check::{HealthCheck, HealthError, HealthResult};
pub use checker::{HealthStatus, HealthTracker, ProbeResult, http_probe};
