//! Gate error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("missing required environment: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("invalid {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    /// Distinct from a hang: the dependency never answered within the
    /// attempt budget.
    #[error("dependency {address} not reachable after {attempts} attempts: {last_error}")]
    Exhausted {
        address: String,
        attempts: u32,
        last_error: String,
    },

    #[error("no command to hand off to")]
    EmptyCommand,

    #[error("failed to exec {command}: {source}")]
    Exec {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type GateResult<T> = Result<T, GateError>;
