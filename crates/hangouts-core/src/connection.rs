//! Transport readiness state machine.
//!
//! Both transports report readiness with the WebSocket numbering. The engine
//! does not open or close anything itself; it only reacts to readiness
//! changes. [`Connection`] validates each change and returns the actions the
//! engine must run.
//!
//! # State Machine
//!
//! ```text
//!            connect             open              close
//! ┌────────┐ ───────> ┌────────────┐ ───> ┌──────┐ ──────> ┌─────────┐
//! │ CLOSED │          │ CONNECTING │      │ OPEN │         │ CLOSING │
//! └────────┘ <─────── └────────────┘      └──────┘         └─────────┘
//!     ^  ^     error                         │ error            │
//!     │  └───────────────────────────────────┘                  │
//!     └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Entering `OPEN` flushes the offline queue. Entering `CLOSED` requeues
//! flushed items that were never acknowledged.

use std::fmt;

use crate::error::ConnectionError;

/// Transport readiness, numbered as WebSocket `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Frames can be sent.
    Open = 1,
    /// Close handshake in progress.
    Closing = 2,
    /// No connection.
    #[default]
    Closed = 3,
}

impl ReadyState {
    /// Parse the numeric readiness.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Connecting),
            1 => Some(Self::Open),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }

    /// Numeric readiness, for connectivity indicators.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether commands can be sent right now.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        })
    }
}

/// Actions returned by the readiness state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Readiness just became `OPEN`: replay the offline queue.
    FlushOfflineQueue,
    /// Readiness just became `CLOSED`: move unacknowledged replays back to the
    /// offline queue.
    RequeueInFlight,
}

/// Readiness state machine for one transport.
///
/// Pure: no I/O, no clock.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    state: ReadyState,
    opened: u64,
}

impl Connection {
    /// Create a connection in [`ReadyState::Closed`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current readiness.
    pub fn state(&self) -> ReadyState {
        self.state
    }

    /// Number of times readiness has entered `OPEN`.
    pub fn opened_count(&self) -> u64 {
        self.opened
    }

    /// Check whether `from -> to` is a lifecycle transition.
    ///
    /// Reporting the current state again is always allowed.
    pub fn check(from: ReadyState, to: ReadyState) -> Result<(), ConnectionError> {
        use ReadyState as R;

        let allowed = from == to
            || matches!(
                (from, to),
                (R::Closed, R::Connecting)
                    | (R::Connecting, R::Open | R::Closed)
                    | (R::Open, R::Closing | R::Closed)
                    | (R::Closing, R::Closed)
            );

        if allowed { Ok(()) } else { Err(ConnectionError::InvalidTransition { from, to }) }
    }

    /// Adopt the readiness reported by the transport.
    ///
    /// Invalid transitions are logged and adopted anyway: the transport is
    /// the ground truth. Repeating the current state returns no actions.
    pub fn transition(&mut self, next: ReadyState) -> Vec<ConnectionAction> {
        let previous = self.state;
        if previous == next {
            return Vec::new();
        }

        if let Err(err) = Self::check(previous, next) {
            tracing::warn!(%err, "adopting readiness reported by transport");
        }

        self.state = next;
        tracing::info!(from = %previous, to = %next, "readiness changed");

        match next {
            ReadyState::Open => {
                self.opened += 1;
                vec![ConnectionAction::FlushOfflineQueue]
            },
            ReadyState::Closed => vec![ConnectionAction::RequeueInFlight],
            ReadyState::Connecting | ReadyState::Closing => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let conn = Connection::new();
        assert_eq!(conn.state(), ReadyState::Closed);
        assert_eq!(conn.opened_count(), 0);
    }

    #[test]
    fn numbering_matches_websocket() {
        assert_eq!(ReadyState::Connecting.as_u8(), 0);
        assert_eq!(ReadyState::Open.as_u8(), 1);
        assert_eq!(ReadyState::Closing.as_u8(), 2);
        assert_eq!(ReadyState::Closed.as_u8(), 3);

        for value in 0..4 {
            assert_eq!(ReadyState::from_u8(value).map(ReadyState::as_u8), Some(value));
        }
        assert_eq!(ReadyState::from_u8(4), None);
    }

    #[test]
    fn open_flushes_offline_queue() {
        let mut conn = Connection::new();

        assert!(conn.transition(ReadyState::Connecting).is_empty());
        assert_eq!(conn.transition(ReadyState::Open), vec![ConnectionAction::FlushOfflineQueue]);
        assert_eq!(conn.opened_count(), 1);
    }

    #[test]
    fn close_requeues_in_flight() {
        let mut conn = Connection::new();
        conn.transition(ReadyState::Connecting);
        conn.transition(ReadyState::Open);

        assert!(conn.transition(ReadyState::Closing).is_empty());
        assert_eq!(conn.transition(ReadyState::Closed), vec![ConnectionAction::RequeueInFlight]);
    }

    #[test]
    fn repeated_state_is_a_no_op() {
        let mut conn = Connection::new();
        conn.transition(ReadyState::Connecting);
        conn.transition(ReadyState::Open);

        assert!(conn.transition(ReadyState::Open).is_empty());
        assert_eq!(conn.opened_count(), 1);
    }

    #[test]
    fn invalid_transition_is_adopted() {
        let mut conn = Connection::new();

        assert!(Connection::check(ReadyState::Closed, ReadyState::Open).is_err());
        assert_eq!(conn.transition(ReadyState::Open), vec![ConnectionAction::FlushOfflineQueue]);
        assert_eq!(conn.state(), ReadyState::Open);
    }

    #[test]
    fn error_paths_close_directly() {
        assert!(Connection::check(ReadyState::Connecting, ReadyState::Closed).is_ok());
        assert!(Connection::check(ReadyState::Open, ReadyState::Closed).is_ok());
        assert!(Connection::check(ReadyState::Closing, ReadyState::Open).is_err());
    }
}
