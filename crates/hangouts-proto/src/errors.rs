//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or encoding protocol values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A command name outside the six known verbs.
    ///
    /// Only reachable at parse boundaries (wire, command line). Inside the
    /// engine commands are a closed enum.
    #[error("unrecognized command: {0:?}")]
    UnrecognizedCommand(String),

    /// A state name outside the twelve relationship states.
    #[error("unrecognized hangout state: {0:?}")]
    UnrecognizedState(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
