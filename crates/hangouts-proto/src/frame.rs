//! JSON frames exchanged with the socket server.
//!
//! Client to server, every frame is a [`CommandFrame`]: one command against
//! one peer. Server to client, frames are a [`ServerFrame`] discriminated by
//! a `type` field:
//!
//! ```text
//! {"type":"ACKHOWLEDGEMENT","hangout":{..}}   our command was applied
//! {"type":"HANGOUT","hangout":{..}}           a peer's command reached us
//! {"type":"OFFLINE_ACKN","hangout":{..}}      a replayed offline command was applied
//! {"type":"UNREAD_HANGOUTS","hangouts":[..]}  peer commands missed while away
//! {"type":"ERROR","message":".."}             server-side failure
//! ```
//!
//! The `ACKHOWLEDGEMENT` spelling is what deployed servers send and is kept
//! on the wire; the Rust variant is spelled correctly.

use serde::{Deserialize, Serialize};

use crate::{
    command::Command,
    errors::Result,
    hangout::{Hangout, MessageBody},
};

/// Command sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFrame {
    /// Target peer.
    pub username: String,
    /// Target peer email.
    #[serde(default)]
    pub email: String,
    /// Message attached to the command.
    #[serde(default)]
    pub message: Option<MessageBody>,
    /// The verb.
    pub command: Command,
    /// Unix milliseconds when the command was issued.
    pub timestamp: u64,
    /// Set when the command is replayed from the offline queue.
    #[serde(default, skip_serializing_if = "is_false")]
    pub offline: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if signature")]
fn is_false(value: &bool) -> bool {
    !*value
}

impl CommandFrame {
    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a JSON text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Frame sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    /// A command issued by the local user was applied.
    #[serde(rename = "ACKHOWLEDGEMENT")]
    Acknowledgement {
        /// The local user's record for the peer, as the server stored it.
        hangout: Hangout,
    },

    /// A peer issued a command against the local user.
    Hangout {
        /// Record keyed by the issuing peer.
        hangout: Hangout,
    },

    /// A command replayed from the offline queue was applied.
    #[serde(rename = "OFFLINE_ACKN")]
    OfflineAck {
        /// The local user's record for the peer, as the server stored it.
        hangout: Hangout,
    },

    /// Peer commands that arrived while the local user was disconnected.
    UnreadHangouts {
        /// Records keyed by the issuing peers, oldest first.
        hangouts: Vec<Hangout>,
    },

    /// Server-side failure.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl ServerFrame {
    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a JSON text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of the frame type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerFrame::Acknowledgement { .. } => "ACKHOWLEDGEMENT",
            ServerFrame::Hangout { .. } => "HANGOUT",
            ServerFrame::OfflineAck { .. } => "OFFLINE_ACKN",
            ServerFrame::UnreadHangouts { .. } => "UNREAD_HANGOUTS",
            ServerFrame::Error { .. } => "ERROR",
        }
    }
}
