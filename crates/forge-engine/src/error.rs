//! Engine error types.

use thiserror::Error;

/// Failure reported by a provisioning backend for one resource.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("{0}")]
    Failed(String),

    #[error("not ready after {0:?}")]
    NotReady(std::time::Duration),

    #[error("missing input {0}")]
    MissingInput(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] forge_graph::GraphError),

    #[error("state store error: {0}")]
    State(#[from] forge_state::StateError),

    #[error("{resource}: input {input} is bound to {binding}, which has no such attribute")]
    UnresolvedInput {
        resource: String,
        input: String,
        binding: String,
    },

    #[error("live record {0} is not a known resource kind")]
    UnknownRecord(String),

    #[error("live state has a dependency cycle between: {}", .0.join(", "))]
    LiveCycle(Vec<String>),

    #[error("apply task failed: {0}")]
    Join(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
