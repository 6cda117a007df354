//! Engine events and actions.

use hangouts_core::ReadyState;
use hangouts_proto::{Command, CommandFrame, Hangout, HangoutState, Message, ServerFrame};

/// A command the local user issues against one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommand {
    /// The verb.
    pub command: Command,
    /// Target peer username.
    pub peer: String,
    /// Target peer email. Empty keeps the email already cached.
    pub email: String,
    /// Message text, if the command carries one.
    pub message: Option<String>,
    /// The caller believes the device is online. Combined with transport
    /// readiness to decide between sending and queueing.
    pub online_hint: bool,
}

impl IssueCommand {
    /// Command with no email, no message, online hint set.
    pub fn new(command: Command, peer: impl Into<String>) -> Self {
        Self { command, peer: peer.into(), email: String::new(), message: None, online_hint: true }
    }

    /// Attach message text.
    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(text.into());
        self
    }

    /// Set the peer email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Set the online hint.
    #[must_use]
    pub fn online(mut self, online_hint: bool) -> Self {
        self.online_hint = online_hint;
        self
    }
}

/// Events the caller feeds into the engine.
///
/// The caller is responsible for:
/// - Forwarding user intents (commands, focus changes)
/// - Receiving frames from the transport
/// - Reporting transport readiness
/// - Driving time forward via ticks
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The local user issued a command.
    IssueCommand(IssueCommand),

    /// Frame received from the transport.
    FrameReceived(ServerFrame),

    /// The user opened the hangout with `peer`.
    FocusHangout {
        /// Peer whose hangout is now on screen.
        peer: String,
    },

    /// The user left the focused hangout.
    LeaveHangout,

    /// The user dismissed an unread notification without opening it.
    DismissUnread {
        /// Peer whose unread entry is dismissed.
        peer: String,
    },

    /// Transport readiness changed.
    ConnectionChanged(ReadyState),

    /// The transport failed outside of a readiness change.
    TransportError {
        /// Human-readable description.
        reason: String,
    },

    /// The transport refused a delivery the engine handed it.
    SendFailed {
        /// The refused delivery.
        delivery: Delivery,
        /// Human-readable description.
        reason: String,
    },

    /// Time tick for acknowledgement timeouts.
    Tick {
        /// Current unix milliseconds from the environment.
        now: u64,
    },

    /// Load the cached state at startup.
    Restore,
}

/// Transport payload for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The verb.
    pub command: Command,
    /// Issuer's record, keyed by the peer.
    pub sender: Hangout,
    /// Recipient's record, keyed by the local user.
    pub target: Hangout,
    /// Replayed from the offline queue.
    pub offline: bool,
}

impl Delivery {
    /// Target peer.
    pub fn peer(&self) -> &str {
        &self.sender.username
    }

    /// Socket wire frame for this delivery.
    pub fn to_frame(&self) -> CommandFrame {
        CommandFrame {
            username: self.sender.username.clone(),
            email: self.sender.email.clone(),
            message: self.sender.message.clone(),
            command: self.command,
            timestamp: self.sender.timestamp,
            offline: self.offline,
        }
    }
}

/// Actions the engine produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Hand this delivery to the transport.
    Send(Delivery),

    /// A hangout was inserted or replaced in the cache.
    HangoutUpdated(Hangout),

    /// The message list with `peer` changed.
    MessagesUpdated {
        /// Peer
        peer: String,
        /// Full list after the change
        messages: Vec<Message>,
    },

    /// The unread list changed.
    UnreadUpdated(Vec<Hangout>),

    /// Switch the UI to the screen for `state` with `peer`.
    Route {
        /// Peer
        peer: String,
        /// State that selects the screen
        state: HangoutState,
    },

    /// A command was sent and awaits acknowledgement.
    PendingStarted(Hangout),

    /// The pending command for `peer` was acknowledged.
    PendingResolved {
        /// Peer
        peer: String,
        /// Timestamp of the acknowledged command
        timestamp: u64,
    },

    /// A command was stored in the offline queue instead of being sent.
    Queued {
        /// Peer
        peer: String,
        /// Queued command
        command: Command,
        /// Timestamp of the queued command
        timestamp: u64,
    },

    /// Unacknowledged replays went back to the offline queue.
    Requeued {
        /// Number of commands moved back
        count: usize,
    },

    /// The pending command for `peer` was not acknowledged in time.
    DeliveryTimedOut {
        /// Peer
        peer: String,
        /// Timestamp of the unacknowledged command
        timestamp: u64,
    },

    /// Cached state loaded at startup.
    Restored {
        /// All hangouts
        hangouts: Vec<Hangout>,
        /// Unread hangouts
        unread: Vec<Hangout>,
        /// Commands waiting in the offline queue
        queued: usize,
    },

    /// Transport readiness changed.
    ConnectionChanged(ReadyState),

    /// Something the user should see went wrong.
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// What a transport reports to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Readiness became `OPEN`.
    Open,
    /// Readiness became `CLOSED`.
    Closed,
    /// Failure outside of a readiness change.
    Error(String),
    /// Frame for the engine.
    Frame(ServerFrame),
}
