//! Engine state machine.
//!
//! The `Engine` owns one local user's view of the cache and the transport
//! readiness. Each [`EngineEvent`] runs to completion: the handler stages
//! its cache writes in a [`CacheTxn`](hangouts_core::CacheTxn), commits them
//! as one batch, and only then updates in-memory state and returns actions.
//! A failed commit therefore leaves both the cache and the engine unchanged.
//!
//! Handlers live next to their concern:
//!
//! - `deliver`: locally issued commands
//! - `receive`: inbound server frames
//! - `ledger`: focus and read/unread bookkeeping
//! - `offline`: readiness changes, queue flush, failed sends, restore, ack
//!   timeouts

use std::{collections::BTreeMap, time::Duration};

use hangouts_core::{Connection, Environment, ReadyState, Storage, StorageError};
use hangouts_proto::{Command, Hangout};

use crate::{
    error::EngineError,
    event::{Delivery, EngineAction, EngineEvent},
};

/// How locally issued commands are checked against the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Reject commands that are not legal from the current state.
    #[default]
    Strict,
    /// Apply every command.
    Permissive,
}

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Check applied to locally issued commands
    pub policy: TransitionPolicy,
    /// Give up on an unacknowledged command after this long. `None` waits
    /// forever.
    pub ack_timeout: Option<Duration>,
}

/// The local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Username, the key peers use for this user.
    pub username: String,
    /// Email shown to peers.
    pub email: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self { username: username.into(), email: email.into() }
    }
}

/// A sent command awaiting acknowledgement.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub(crate) hangout: Hangout,
    pub(crate) issued_at: u64,
}

/// Hangout synchronization engine for one local user.
pub struct Engine<S: Storage, E: Environment> {
    /// Environment for timestamps.
    pub(crate) env: E,

    /// Persistent cache.
    pub(crate) storage: S,

    /// Local user.
    pub(crate) identity: Identity,

    /// Configuration.
    pub(crate) config: EngineConfig,

    /// Transport readiness.
    pub(crate) connection: Connection,

    /// Peer whose hangout is on screen.
    pub(crate) focused: Option<String>,

    /// Sent commands awaiting acknowledgement, by peer and timestamp.
    pub(crate) pending: BTreeMap<(String, u64), Pending>,

    /// Last timestamp handed out, keeps local timestamps strictly increasing.
    pub(crate) last_timestamp: u64,
}

impl<S: Storage, E: Environment> Engine<S, E> {
    /// Create an engine for `identity` over `storage`.
    pub fn new(env: E, storage: S, identity: Identity, config: EngineConfig) -> Self {
        Self {
            env,
            storage,
            identity,
            config,
            connection: Connection::new(),
            focused: None,
            pending: BTreeMap::new(),
            last_timestamp: 0,
        }
    }

    /// Local user.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Local username.
    pub fn username(&self) -> &str {
        &self.identity.username
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying cache.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Current transport readiness.
    pub fn ready_state(&self) -> ReadyState {
        self.connection.state()
    }

    /// Peer whose hangout is focused, if any.
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Commands sent and not yet acknowledged, ordered by peer, then by
    /// timestamp.
    pub fn pending(&self) -> impl Iterator<Item = &Hangout> {
        self.pending.values().map(|p| &p.hangout)
    }

    /// Cached hangouts whose username contains `query`, ignoring case.
    ///
    /// Used for search while the transport is not open.
    pub fn search_cached(&self, query: &str) -> Result<Vec<Hangout>, StorageError> {
        let needle = query.to_lowercase();
        Ok(self
            .storage
            .hangouts(self.username())?
            .into_iter()
            .filter(|h| h.username.to_lowercase().contains(&needle))
            .collect())
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: EngineEvent) -> Result<Vec<EngineAction>, EngineError> {
        match event {
            EngineEvent::IssueCommand(request) => self.handle_issue_command(request),
            EngineEvent::FrameReceived(frame) => self.handle_frame(frame),
            EngineEvent::FocusHangout { peer } => self.handle_focus(&peer),
            EngineEvent::LeaveHangout => Ok(self.handle_leave()),
            EngineEvent::DismissUnread { peer } => self.handle_dismiss(&peer),
            EngineEvent::ConnectionChanged(state) => self.handle_ready_state(state),
            EngineEvent::TransportError { reason } => {
                tracing::warn!(user = %self.identity.username, %reason, "transport error");
                Ok(vec![EngineAction::Error { message: reason }])
            },
            EngineEvent::SendFailed { delivery, reason } => {
                self.handle_send_failed(delivery, reason)
            },
            EngineEvent::Tick { now } => Ok(self.handle_tick(now)),
            EngineEvent::Restore => self.handle_restore(),
        }
    }

    /// Next local timestamp: wall clock, bumped past the previous one.
    ///
    /// Message timestamps are message identities, so two commands issued in
    /// the same millisecond must not share one.
    pub(crate) fn next_timestamp(&mut self) -> u64 {
        let now = self.env.now_millis().max(self.last_timestamp + 1);
        self.last_timestamp = now;
        now
    }

    /// Build the delivery for a sender-side record.
    pub(crate) fn delivery(&self, command: Command, sender: Hangout, offline: bool) -> Delivery {
        let target = Hangout {
            username: self.identity.username.clone(),
            email: self.identity.email.clone(),
            message: sender.message.clone(),
            state: command.states().target,
            timestamp: sender.timestamp,
            delivered: false,
            read: false,
        };
        Delivery { command, sender, target, offline }
    }
}
