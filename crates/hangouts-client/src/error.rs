//! Engine error types.

use hangouts_core::StorageError;
use hangouts_proto::{Command, HangoutState};
use thiserror::Error;

/// Errors returned by [`Engine::handle`](crate::Engine::handle).
///
/// None of these are retried. The caller surfaces them to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The command is not legal from the current relationship state.
    #[error("cannot {command} {peer} from {}", .current.map_or("no hangout", HangoutState::as_str))]
    IllegalTransition {
        /// Rejected command
        command: Command,
        /// Target peer
        peer: String,
        /// State of the existing hangout, if any
        current: Option<HangoutState>,
    },

    /// The command targets the local user.
    #[error("cannot {command} yourself")]
    SelfCommand {
        /// Rejected command
        command: Command,
    },

    /// The command has no target peer.
    #[error("peer username is empty")]
    EmptyPeer,

    /// The cache could not be read or written. Nothing was committed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
