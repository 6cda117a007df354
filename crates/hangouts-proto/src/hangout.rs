//! Hangout and message records.
//!
//! These are the values persisted in the cache and carried in wire frames.
//! Lists of them are merged, never blindly appended:
//!
//! - hangouts are unique by `username` within one user's list
//!   ([`upsert_hangout`]),
//! - messages are unique by `timestamp` within one peer's list
//!   ([`merge_message`]).

use serde::{Deserialize, Serialize};

use crate::command::HangoutState;

/// Message embedded in a hangout or a command frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Message text.
    pub text: String,
    /// Unix milliseconds. Doubles as the message's identity.
    pub timestamp: u64,
}

/// Relationship record between the local user and one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hangout {
    /// Peer id. Unique key within a user's hangout list.
    pub username: String,
    /// Peer email.
    #[serde(default)]
    pub email: String,
    /// Last message carried by the command or event, if any.
    #[serde(default)]
    pub message: Option<MessageBody>,
    /// Current relationship state.
    pub state: HangoutState,
    /// Unix milliseconds of the last update.
    pub timestamp: u64,
    /// Remote side has acknowledged the last command.
    #[serde(default)]
    pub delivered: bool,
    /// Local user has seen the last update.
    #[serde(default)]
    pub read: bool,
}

impl Hangout {
    /// Create a hangout with no message, not delivered, unread.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        state: HangoutState,
        timestamp: u64,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            message: None,
            state,
            timestamp,
            delivered: false,
            read: false,
        }
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: Option<MessageBody>) -> Self {
        self.message = message;
        self
    }
}

/// Kind tag for locally generated messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Notice that a message could not be delivered because the peer has
    /// blocked the local user.
    Blocker,
}

/// Chat message in a per-peer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message text.
    pub text: String,
    /// Unix milliseconds. Used as the message's identity when merging.
    pub timestamp: u64,
    /// Author of the message.
    pub username: String,
    /// Local user has seen the message.
    #[serde(default)]
    pub read: bool,
    /// Remote side has acknowledged the message.
    #[serde(default)]
    pub delivered: bool,
    /// Set for locally generated notices. `None` for chat messages.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

impl Message {
    /// Build a chat message from an embedded body.
    pub fn from_body(body: &MessageBody, username: impl Into<String>) -> Self {
        Self {
            text: body.text.clone(),
            timestamp: body.timestamp,
            username: username.into(),
            read: false,
            delivered: false,
            kind: None,
        }
    }

    /// Body of this message, for embedding into a hangout.
    pub fn body(&self) -> MessageBody {
        MessageBody { text: self.text.clone(), timestamp: self.timestamp }
    }
}

/// Outcome of merging a record into a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No record with the same key existed; the record was appended.
    Inserted,
    /// A record with the same key was replaced in place.
    Replaced,
}

/// Insert `hangout` into `list`, replacing the entry with the same
/// `username` in place.
pub fn upsert_hangout(list: &mut Vec<Hangout>, hangout: Hangout) -> Upsert {
    match list.iter().position(|h| h.username == hangout.username) {
        Some(index) => {
            list[index] = hangout;
            Upsert::Replaced
        },
        None => {
            list.push(hangout);
            Upsert::Inserted
        },
    }
}

/// Insert `message` into `list`, replacing the entry with the same
/// `timestamp` in place.
pub fn merge_message(list: &mut Vec<Message>, message: Message) -> Upsert {
    match list.iter().position(|m| m.timestamp == message.timestamp) {
        Some(index) => {
            list[index] = message;
            Upsert::Replaced
        },
        None => {
            list.push(message);
            Upsert::Inserted
        },
    }
}
