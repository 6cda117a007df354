//! Storage error types.

use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend failure (database open, transaction, table access).
    #[error("storage I/O error: {0}")]
    Io(String),

    /// A cached value could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(String),
}
