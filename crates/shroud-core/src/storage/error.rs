use thiserror::Error;

/// Errors from a [`Storage`](super::Storage) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend I/O or transaction failure
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be encoded or decoded
    #[error("storage serialization error: {0}")]
    Serialization(String),
}
