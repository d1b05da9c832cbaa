//! Graph-resolution errors. All of them are raised before any resource
//! is touched.

use std::fmt;

use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

/// A reference that does not resolve to a declared entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingRef {
    /// The entity holding the reference, e.g. `service/webui`.
    pub from: String,
    /// The reference as written.
    pub target: String,
    /// Why it failed to resolve.
    pub reason: String,
}

impl fmt::Display for DanglingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}: {}", self.from, self.target, self.reason)
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unresolved references:\n  {}", join(.0, "\n  "))]
    Dangling(Vec<DanglingRef>),

    #[error("dependency cycle between: {}", .members.join(", "))]
    Cycle { members: Vec<String> },

    #[error("container start-order cycle in service {service}: {}", .members.join(", "))]
    ContainerCycle { service: String, members: Vec<String> },

    #[error("topology violations:\n  {}", join(.0, "\n  "))]
    Topology(Vec<String>),

    #[error("subnet layout: {0}")]
    Layout(String),

    #[error("duplicate resource {0}")]
    Duplicate(String),

    #[error("unknown resource {0}")]
    UnknownResource(String),

    #[error(transparent)]
    Config(#[from] forge_core::ConfigError),
}
