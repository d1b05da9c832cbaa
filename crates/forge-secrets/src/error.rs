use thiserror::Error;

pub type SecretResult<T> = Result<T, SecretError>;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret {name:?}: length {length} is below the minimum of {min}")]
    TooShort { name: String, length: usize, min: usize },

    #[error("secret {name:?}: length {length} exceeds the maximum of {max}")]
    TooLong { name: String, length: usize, max: usize },

    #[error("secret {name:?}: exclusion set leaves no characters to draw from")]
    EmptyAlphabet { name: String },

    #[error("secret {0:?} is declared more than once")]
    Duplicate(String),

    #[error("secret {0:?} is not declared in this stack")]
    Undeclared(String),

    #[error("state store error: {0}")]
    State(#[from] forge_state::StateError),
}
