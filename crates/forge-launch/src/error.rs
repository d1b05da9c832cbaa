//! Launcher error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("container {container} depends on unknown container {upstream}")]
    UnknownDependency { container: String, upstream: String },

    #[error("container start-order cycle in unit {unit}: {}", .members.join(", "))]
    Cycle { unit: String, members: Vec<String> },

    #[error("container {container}: {reason}")]
    Runtime { container: String, reason: String },
}

impl LaunchError {
    pub fn runtime(container: &str, reason: impl Into<String>) -> Self {
        LaunchError::Runtime {
            container: container.to_string(),
            reason: reason.into(),
        }
    }
}

pub type LaunchResult<T> = Result<T, LaunchError>;
