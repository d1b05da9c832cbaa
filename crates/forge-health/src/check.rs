//! Health check definitions.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use forge_core::{HealthCheckSpec, parse_duration};

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("invalid health check {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
}

pub type HealthResult<T> = Result<T, HealthError>;

/// A parsed health check: which path to hit, which status counts as
/// healthy, and how results are smoothed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub path: String,
    pub expected_status: u16,
    pub interval: Duration,
    pub timeout: Duration,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

impl HealthCheck {
    pub fn from_spec(spec: &HealthCheckSpec) -> HealthResult<Self> {
        let duration = |field: &'static str, value: &str| {
            parse_duration(value).ok_or_else(|| HealthError::Invalid {
                field,
                value: value.to_string(),
            })
        };
        if !spec.path.starts_with('/') {
            return Err(HealthError::Invalid {
                field: "path",
                value: spec.path.clone(),
            });
        }
        if !(100..=599).contains(&spec.expected_status) {
            return Err(HealthError::Invalid {
                field: "expected_status",
                value: spec.expected_status.to_string(),
            });
        }
        Ok(Self {
            path: spec.path.clone(),
            expected_status: spec.expected_status,
            interval: duration("interval", &spec.interval)?,
            timeout: duration("timeout", &spec.timeout)?,
            unhealthy_threshold: spec.unhealthy_threshold.max(1),
            healthy_threshold: spec.healthy_threshold.max(1),
        })
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            expected_status: 200,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}
