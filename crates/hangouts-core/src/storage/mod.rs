//! Persistent cache storage
//!
//! A synchronous key/value abstraction over JSON lists. Every value in the
//! cache is a list (of hangouts or of messages) stored under a [`CacheKey`].
//! An absent key reads as an empty list.
//!
//! Writes go through a [`WriteBatch`] that backends apply atomically: either
//! every put and delete in the batch lands, or none does. Handlers stage
//! their writes with [`CacheTxn`](crate::cache::CacheTxn) and commit once.

mod chaotic;
mod error;
mod memory;
mod redb;

use std::fmt;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
use hangouts_proto::{Hangout, Message};
pub use memory::MemoryStorage;
use serde::{Serialize, de::DeserializeOwned};

pub use self::redb::RedbStorage;
use crate::cache::CacheTxn;

/// Typed cache key.
///
/// Rendered keys follow the layout clients have always used, so an existing
/// cache stays readable:
///
/// ```text
/// <user>-hangouts                  [Hangout]
/// <user>-<peer>-messages           [Message]
/// <user>-unread-hangouts           [Hangout]  read == false
/// <user>-offline-hangouts          [Hangout]  not yet sent
/// <user>-<peer>-offline-messages   [Message]  not yet sent
/// <user>-inflight-hangouts         [Hangout]  sent, awaiting OFFLINE_ACKN
/// ```
///
/// `-` and `%` inside a user or peer name are percent-escaped, so distinct
/// keys never render alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// All hangouts of a user.
    Hangouts {
        /// Local user
        user: String,
    },
    /// Messages exchanged with one peer.
    Messages {
        /// Local user
        user: String,
        /// Peer
        peer: String,
    },
    /// Hangouts with updates the user has not seen.
    Unread {
        /// Local user
        user: String,
    },
    /// Commands issued while the transport was not open.
    Offline {
        /// Local user
        user: String,
    },
    /// Messages written to one peer while the transport was not open.
    OfflineMessages {
        /// Local user
        user: String,
        /// Peer
        peer: String,
    },
    /// Offline commands replayed but not yet acknowledged.
    InFlight {
        /// Local user
        user: String,
    },
}

impl CacheKey {
    /// Key of a user's hangout list.
    pub fn hangouts(user: &str) -> Self {
        Self::Hangouts { user: user.to_string() }
    }

    /// Key of the message list between `user` and `peer`.
    pub fn messages(user: &str, peer: &str) -> Self {
        Self::Messages { user: user.to_string(), peer: peer.to_string() }
    }

    /// Key of a user's unread list.
    pub fn unread(user: &str) -> Self {
        Self::Unread { user: user.to_string() }
    }

    /// Key of a user's offline queue.
    pub fn offline(user: &str) -> Self {
        Self::Offline { user: user.to_string() }
    }

    /// Key of the offline message list between `user` and `peer`.
    pub fn offline_messages(user: &str, peer: &str) -> Self {
        Self::OfflineMessages { user: user.to_string(), peer: peer.to_string() }
    }

    /// Key of a user's in-flight list.
    pub fn in_flight(user: &str) -> Self {
        Self::InFlight { user: user.to_string() }
    }
}

/// A user or peer name inside a rendered key.
///
/// `-` separates key parts, so it is escaped as `%2D` (and `%` as `%25`).
/// Names without either render unchanged.
struct KeyPart<'a>(&'a str);

impl fmt::Display for KeyPart<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '-' => f.write_str("%2D")?,
                '%' => f.write_str("%25")?,
                _ => fmt::Write::write_char(f, c)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hangouts { user } => write!(f, "{}-hangouts", KeyPart(user)),
            Self::Messages { user, peer } => {
                write!(f, "{}-{}-messages", KeyPart(user), KeyPart(peer))
            },
            Self::Unread { user } => write!(f, "{}-unread-hangouts", KeyPart(user)),
            Self::Offline { user } => write!(f, "{}-offline-hangouts", KeyPart(user)),
            Self::OfflineMessages { user, peer } => {
                write!(f, "{}-{}-offline-messages", KeyPart(user), KeyPart(peer))
            },
            Self::InFlight { user } => write!(f, "{}-inflight-hangouts", KeyPart(user)),
        }
    }
}

/// One staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Replace the value stored under `key`.
    Put {
        /// Target key
        key: CacheKey,
        /// Encoded JSON list
        value: Vec<u8>,
    },
    /// Remove `key`.
    Delete {
        /// Target key
        key: CacheKey,
    },
}

/// Writes applied atomically by [`Storage::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `list` as the JSON value of `key`.
    pub fn put_list<T: Serialize>(
        &mut self,
        key: CacheKey,
        list: &[T],
    ) -> Result<(), StorageError> {
        let value =
            serde_json::to_vec(list).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.ops.push(BatchOp::Put { key, value });
        Ok(())
    }

    /// Stage removal of `key`.
    pub fn delete(&mut self, key: CacheKey) {
        self.ops.push(BatchOp::Delete { key });
    }

    /// Staged operations, in order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Storage abstraction for the hangouts cache
///
/// Must be Clone (engine, app and harness hold handles to the same cache),
/// Send + Sync, and synchronous. Implementations share internal state via
/// Arc, so clones access the same underlying storage.
///
/// Backends implement two primitives; typed accessors are provided on top.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned. Acceptable for test/simulation code.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Raw JSON value under `key`. `None` if the key was never written.
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StorageError>;

    /// Apply every operation in `batch`, or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Decode the list under `key`. An absent key is an empty list.
    fn load_list<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Vec<T>, StorageError> {
        match self.load(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Serialization(format!("{key}: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// All hangouts of `user`.
    fn hangouts(&self, user: &str) -> Result<Vec<Hangout>, StorageError> {
        self.load_list(&CacheKey::hangouts(user))
    }

    /// The hangout between `user` and `peer`, if any.
    fn hangout(&self, user: &str, peer: &str) -> Result<Option<Hangout>, StorageError> {
        Ok(self.hangouts(user)?.into_iter().find(|h| h.username == peer))
    }

    /// Insert or replace one hangout, matched by `username`.
    fn put_hangout(&self, user: &str, hangout: Hangout) -> Result<(), StorageError> {
        let mut txn = CacheTxn::new(self, user);
        txn.upsert_hangout(hangout)?;
        txn.commit()
    }

    /// Messages between `user` and `peer`, in insertion order.
    fn messages(&self, user: &str, peer: &str) -> Result<Vec<Message>, StorageError> {
        self.load_list(&CacheKey::messages(user, peer))
    }

    /// Unread hangouts of `user`.
    fn list_unread(&self, user: &str) -> Result<Vec<Hangout>, StorageError> {
        self.load_list(&CacheKey::unread(user))
    }

    /// Offline queue of `user`, oldest first.
    fn offline_queue(&self, user: &str) -> Result<Vec<Hangout>, StorageError> {
        self.load_list(&CacheKey::offline(user))
    }

    /// Messages to `peer` written while offline.
    fn offline_messages(&self, user: &str, peer: &str) -> Result<Vec<Message>, StorageError> {
        self.load_list(&CacheKey::offline_messages(user, peer))
    }

    /// Replayed offline commands awaiting acknowledgement.
    fn in_flight(&self, user: &str) -> Result<Vec<Hangout>, StorageError> {
        self.load_list(&CacheKey::in_flight(user))
    }
}
