//! Stack configuration errors.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read stack file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse stack file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render stack file: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid {kind} name {name:?}: must match [a-z][a-z0-9-]* (max 63 chars)")]
    InvalidName { kind: &'static str, name: String },

    #[error("duplicate {kind} {name:?}")]
    Duplicate { kind: &'static str, name: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("invalid reference {0:?}: expected kind:name[.attribute]")]
    InvalidReference(String),

    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
