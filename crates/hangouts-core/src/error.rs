//! Error types for the readiness state machine.
//!
//! Storage failures live next to the backends in
//! [`storage::StorageError`](crate::storage::StorageError).

use thiserror::Error;

use crate::connection::ReadyState;

/// Errors raised by [`Connection`](crate::connection::Connection).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The transport reported a readiness change the lifecycle does not allow.
    #[error("invalid readiness transition: {from} -> {to}")]
    InvalidTransition {
        /// Readiness before the change
        from: ReadyState,
        /// Readiness the transport reported
        to: ReadyState,
    },
}
