//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use hangouts_core::{ReadyState, Storage, StorageError};
use hangouts_proto::Hangout;
use serde::Serialize;

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }

    /// Client snapshot for `user`.
    pub fn client(&self, user: &str) -> Option<&ClientSnapshot> {
        self.clients.iter().find(|c| c.user == user)
    }
}

/// Snapshot of one client's cache and engine state.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    /// Local username.
    pub user: String,
    /// Transport readiness as the engine sees it.
    #[serde(serialize_with = "ready_state_name")]
    pub ready_state: ReadyState,
    /// Focused peer.
    pub focused: Option<String>,
    /// Cached hangouts.
    pub hangouts: Vec<Hangout>,
    /// Cached unread list.
    pub unread: Vec<Hangout>,
    /// Offline queue.
    pub offline: Vec<Hangout>,
    /// Replays awaiting `OFFLINE_ACKN`.
    pub in_flight: Vec<Hangout>,
}

impl ClientSnapshot {
    /// Empty snapshot for `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ready_state: ReadyState::Closed,
            focused: None,
            hangouts: Vec::new(),
            unread: Vec::new(),
            offline: Vec::new(),
            in_flight: Vec::new(),
        }
    }

    /// Read the cached lists for `user` from `storage`.
    pub fn from_storage<S: Storage>(
        storage: &S,
        user: &str,
        ready_state: ReadyState,
        focused: Option<&str>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            user: user.to_string(),
            ready_state,
            focused: focused.map(str::to_string),
            hangouts: storage.hangouts(user)?,
            unread: storage.list_unread(user)?,
            offline: storage.offline_queue(user)?,
            in_flight: storage.in_flight(user)?,
        })
    }

    /// Cached hangout with `peer`.
    pub fn hangout(&self, peer: &str) -> Option<&Hangout> {
        self.hangouts.iter().find(|h| h.username == peer)
    }

    /// Set the readiness.
    #[must_use]
    pub fn with_ready_state(mut self, ready_state: ReadyState) -> Self {
        self.ready_state = ready_state;
        self
    }

    /// Set the focused peer.
    #[must_use]
    pub fn with_focused(mut self, peer: Option<&str>) -> Self {
        self.focused = peer.map(str::to_string);
        self
    }

    /// Add a cached hangout.
    #[must_use]
    pub fn with_hangout(mut self, hangout: Hangout) -> Self {
        self.hangouts.push(hangout);
        self
    }

    /// Add an unread entry.
    #[must_use]
    pub fn with_unread(mut self, hangout: Hangout) -> Self {
        self.unread.push(hangout);
        self
    }

    /// Add an offline queue entry.
    #[must_use]
    pub fn with_offline(mut self, hangout: Hangout) -> Self {
        self.offline.push(hangout);
        self
    }
}

fn ready_state_name<S: serde::Serializer>(state: &ReadyState, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(state)
}
