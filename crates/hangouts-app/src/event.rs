//! Application input events.
//!
//! [`AppEvent`] is everything that changes the [`crate::App`] state store.
//! Events come from two places:
//! - the engine, translated by the [`crate::Bridge`],
//! - the runtime (ticks, search results, transport failures).

use hangouts_core::ReadyState;
use hangouts_proto::{Command, Hangout, HangoutState, Message};

/// Events processed by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Periodic tick.
    Tick,

    /// Transport readiness changed.
    ReadyStateChanged(ReadyState),

    /// Cached state loaded at startup.
    Restored {
        /// All hangouts.
        hangouts: Vec<Hangout>,
        /// Unread hangouts.
        unread: Vec<Hangout>,
        /// Commands waiting in the offline queue.
        queued: usize,
    },

    /// A hangout was inserted or replaced.
    HangoutUpdated(Hangout),

    /// The message list with a peer changed.
    MessagesUpdated {
        /// Peer username.
        peer: String,
        /// Full list.
        messages: Vec<Message>,
    },

    /// The unread list changed.
    UnreadUpdated(Vec<Hangout>),

    /// Switch to the screen for a state.
    Route {
        /// Peer username.
        peer: String,
        /// State that selects the screen.
        state: HangoutState,
    },

    /// A command was sent and awaits acknowledgement.
    PendingStarted(Hangout),

    /// The pending command for a peer was acknowledged.
    PendingResolved {
        /// Peer username.
        peer: String,
        /// Timestamp of the acknowledged command.
        timestamp: u64,
    },

    /// A command was stored for later replay.
    Queued {
        /// Peer username.
        peer: String,
        /// Queued command.
        command: Command,
        /// Timestamp of the queued command.
        timestamp: u64,
    },

    /// Queued commands were replayed.
    QueueFlushed {
        /// Number of commands replayed.
        count: usize,
    },

    /// Replays went back to the queue unacknowledged.
    Requeued {
        /// Number of commands requeued.
        count: usize,
    },

    /// A pending command was not acknowledged in time.
    DeliveryTimedOut {
        /// Peer username.
        peer: String,
        /// Timestamp of the unacknowledged command.
        timestamp: u64,
    },

    /// Search finished.
    SearchResults {
        /// The query that produced the results.
        query: String,
        /// Matching hangouts.
        hangouts: Vec<Hangout>,
    },

    /// Error occurred.
    Error {
        /// Error description.
        message: String,
    },
}
