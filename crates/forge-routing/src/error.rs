use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("target {target} is not registered in {group}")]
    UnknownTarget { group: String, target: String },

    #[error("no service registered as {0}")]
    UnknownService(String),

    #[error(transparent)]
    Health(#[from] forge_health::HealthError),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
