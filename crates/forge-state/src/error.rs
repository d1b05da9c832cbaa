use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// redb failures keep their own types. Codec failures name the record key.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("opening state database: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("state transaction: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("state table: {0}")]
    Table(#[from] redb::TableError),

    #[error("state storage: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("committing state: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("state record {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    pub(crate) fn codec(key: &str, source: serde_json::Error) -> Self {
        Self::Codec {
            key: key.to_string(),
            source,
        }
    }
}
