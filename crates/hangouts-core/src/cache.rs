//! Staged cache writes for one handler invocation.
//!
//! A [`CacheTxn`] loads each list the first time it is touched, applies all
//! edits in memory and writes every modified list back in one
//! [`WriteBatch`]. Dropping the transaction without calling
//! [`CacheTxn::commit`] discards the edits.
//!
//! Reads are not isolated from other writers: two processes racing on the
//! same user resolve last-writer-wins per key.

use std::collections::{HashMap, hash_map::Entry};

use hangouts_proto::{Hangout, HangoutState, Message, Upsert, merge_message, upsert_hangout};
use serde::{Serialize, de::DeserializeOwned};

use crate::storage::{CacheKey, Storage, StorageError, WriteBatch};

/// One loaded list and whether it changed.
struct Slot<T> {
    key: CacheKey,
    items: Vec<T>,
    dirty: bool,
}

impl<T: Serialize + DeserializeOwned> Slot<T> {
    fn load<S: Storage>(storage: &S, key: CacheKey) -> Result<Self, StorageError> {
        let items = storage.load_list(&key)?;
        Ok(Self { key, items, dirty: false })
    }

    fn edit(&mut self) -> &mut Vec<T> {
        self.dirty = true;
        &mut self.items
    }

    fn stage(&self, batch: &mut WriteBatch) -> Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }
        if self.items.is_empty() {
            batch.delete(self.key.clone());
            Ok(())
        } else {
            batch.put_list(self.key.clone(), &self.items)
        }
    }
}

fn slot<'a, S: Storage, T: Serialize + DeserializeOwned>(
    storage: &S,
    cell: &'a mut Option<Slot<T>>,
    key: impl FnOnce() -> CacheKey,
) -> Result<&'a mut Slot<T>, StorageError> {
    let loaded = match cell.take() {
        Some(slot) => slot,
        None => Slot::load(storage, key())?,
    };
    Ok(cell.insert(loaded))
}

fn peer_slot<'a, S: Storage, T: Serialize + DeserializeOwned>(
    storage: &S,
    map: &'a mut HashMap<String, Slot<T>>,
    peer: &str,
    key: impl FnOnce() -> CacheKey,
) -> Result<&'a mut Slot<T>, StorageError> {
    match map.entry(peer.to_string()) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => Ok(entry.insert(Slot::load(storage, key())?)),
    }
}

/// Staged edits to one user's cache.
pub struct CacheTxn<'s, S: Storage> {
    storage: &'s S,
    user: String,
    hangouts: Option<Slot<Hangout>>,
    unread: Option<Slot<Hangout>>,
    offline: Option<Slot<Hangout>>,
    in_flight: Option<Slot<Hangout>>,
    messages: HashMap<String, Slot<Message>>,
    offline_messages: HashMap<String, Slot<Message>>,
}

impl<'s, S: Storage> CacheTxn<'s, S> {
    /// Begin staging edits for `user`.
    pub fn new(storage: &'s S, user: &str) -> Self {
        Self {
            storage,
            user: user.to_string(),
            hangouts: None,
            unread: None,
            offline: None,
            in_flight: None,
            messages: HashMap::new(),
            offline_messages: HashMap::new(),
        }
    }

    /// Local user this transaction edits.
    pub fn user(&self) -> &str {
        &self.user
    }

    fn hangouts_slot(&mut self) -> Result<&mut Slot<Hangout>, StorageError> {
        let user = &self.user;
        slot(self.storage, &mut self.hangouts, || CacheKey::hangouts(user))
    }

    fn unread_slot(&mut self) -> Result<&mut Slot<Hangout>, StorageError> {
        let user = &self.user;
        slot(self.storage, &mut self.unread, || CacheKey::unread(user))
    }

    fn offline_slot(&mut self) -> Result<&mut Slot<Hangout>, StorageError> {
        let user = &self.user;
        slot(self.storage, &mut self.offline, || CacheKey::offline(user))
    }

    fn in_flight_slot(&mut self) -> Result<&mut Slot<Hangout>, StorageError> {
        let user = &self.user;
        slot(self.storage, &mut self.in_flight, || CacheKey::in_flight(user))
    }

    fn messages_slot(&mut self, peer: &str) -> Result<&mut Slot<Message>, StorageError> {
        let user = &self.user;
        peer_slot(self.storage, &mut self.messages, peer, || CacheKey::messages(user, peer))
    }

    fn offline_messages_slot(&mut self, peer: &str) -> Result<&mut Slot<Message>, StorageError> {
        let user = &self.user;
        peer_slot(self.storage, &mut self.offline_messages, peer, || {
            CacheKey::offline_messages(user, peer)
        })
    }

    /// All hangouts, including staged edits.
    pub fn hangouts(&mut self) -> Result<&[Hangout], StorageError> {
        Ok(&self.hangouts_slot()?.items)
    }

    /// Hangout for `peer`, including staged edits.
    pub fn hangout(&mut self, peer: &str) -> Result<Option<Hangout>, StorageError> {
        Ok(self.hangouts()?.iter().find(|h| h.username == peer).cloned())
    }

    /// Insert or replace the hangout matched by `username`.
    pub fn upsert_hangout(&mut self, hangout: Hangout) -> Result<Upsert, StorageError> {
        Ok(upsert_hangout(self.hangouts_slot()?.edit(), hangout))
    }

    /// Edit the hangout for `peer` in place. Returns the edited copy, or
    /// `None` if the user has no hangout with `peer`.
    pub fn update_hangout(
        &mut self,
        peer: &str,
        edit: impl FnOnce(&mut Hangout),
    ) -> Result<Option<Hangout>, StorageError> {
        let slot = self.hangouts_slot()?;
        let Some(index) = slot.items.iter().position(|h| h.username == peer) else {
            return Ok(None);
        };

        let hangout = &mut slot.edit()[index];
        edit(hangout);
        Ok(Some(hangout.clone()))
    }

    /// Messages with `peer`, including staged edits.
    pub fn messages(&mut self, peer: &str) -> Result<&[Message], StorageError> {
        Ok(&self.messages_slot(peer)?.items)
    }

    /// Merge one message into the list for `peer`, by timestamp.
    pub fn merge_message(&mut self, peer: &str, message: Message) -> Result<Upsert, StorageError> {
        Ok(merge_message(self.messages_slot(peer)?.edit(), message))
    }

    /// Mark every message with `peer` as read. Returns whether any changed.
    pub fn mark_messages_read(&mut self, peer: &str) -> Result<bool, StorageError> {
        let slot = self.messages_slot(peer)?;
        if slot.items.iter().all(|m| m.read) {
            return Ok(false);
        }

        for message in slot.edit() {
            message.read = true;
        }
        Ok(true)
    }

    /// Unread hangouts, including staged edits.
    pub fn unread(&mut self) -> Result<&[Hangout], StorageError> {
        Ok(&self.unread_slot()?.items)
    }

    /// Record `hangout` as unread, replacing any entry for the same peer.
    pub fn add_unread(&mut self, hangout: Hangout) -> Result<Upsert, StorageError> {
        Ok(upsert_hangout(self.unread_slot()?.edit(), hangout))
    }

    /// Drop `peer` from the unread list. Returns whether it was there.
    pub fn remove_unread(&mut self, peer: &str) -> Result<bool, StorageError> {
        let slot = self.unread_slot()?;
        if !slot.items.iter().any(|h| h.username == peer) {
            return Ok(false);
        }

        slot.edit().retain(|h| h.username != peer);
        Ok(true)
    }

    /// Offline queue, oldest first, including staged edits.
    pub fn offline_queue(&mut self) -> Result<&[Hangout], StorageError> {
        Ok(&self.offline_slot()?.items)
    }

    /// Append a sender-side record to the offline queue.
    pub fn enqueue_offline(&mut self, hangout: Hangout) -> Result<(), StorageError> {
        self.offline_slot()?.edit().push(hangout);
        Ok(())
    }

    /// Append a message to the offline message list for `peer`.
    pub fn enqueue_offline_message(
        &mut self,
        peer: &str,
        message: Message,
    ) -> Result<(), StorageError> {
        merge_message(self.offline_messages_slot(peer)?.edit(), message);
        Ok(())
    }

    /// Offline messages for `peer`, including staged edits.
    pub fn offline_messages(&mut self, peer: &str) -> Result<&[Message], StorageError> {
        Ok(&self.offline_messages_slot(peer)?.items)
    }

    /// Drop the offline message with `timestamp` for `peer`.
    pub fn remove_offline_message(
        &mut self,
        peer: &str,
        timestamp: u64,
    ) -> Result<bool, StorageError> {
        let slot = self.offline_messages_slot(peer)?;
        if !slot.items.iter().any(|m| m.timestamp == timestamp) {
            return Ok(false);
        }

        slot.edit().retain(|m| m.timestamp != timestamp);
        Ok(true)
    }

    /// Empty the offline queue and move its items to the in-flight list.
    /// Returns the moved items, oldest first.
    pub fn take_offline(&mut self) -> Result<Vec<Hangout>, StorageError> {
        let slot = self.offline_slot()?;
        if slot.items.is_empty() {
            return Ok(Vec::new());
        }

        let queued = std::mem::take(slot.edit());
        self.in_flight_slot()?.edit().extend(queued.iter().cloned());
        Ok(queued)
    }

    /// Replayed items awaiting acknowledgement, including staged edits.
    pub fn in_flight(&mut self) -> Result<&[Hangout], StorageError> {
        Ok(&self.in_flight_slot()?.items)
    }

    /// Drop the first in-flight item for `peer` in `state`. Returns whether
    /// one matched.
    pub fn resolve_in_flight(
        &mut self,
        peer: &str,
        state: HangoutState,
    ) -> Result<bool, StorageError> {
        let slot = self.in_flight_slot()?;
        let Some(index) = slot.items.iter().position(|h| h.username == peer && h.state == state)
        else {
            return Ok(false);
        };

        slot.edit().remove(index);
        Ok(true)
    }

    /// Move every in-flight item back to the front of the offline queue, in
    /// their original order. Returns how many moved.
    pub fn requeue_in_flight(&mut self) -> Result<usize, StorageError> {
        let slot = self.in_flight_slot()?;
        if slot.items.is_empty() {
            return Ok(0);
        }

        let mut requeued = std::mem::take(slot.edit());
        let count = requeued.len();

        let queue = self.offline_slot()?.edit();
        requeued.append(queue);
        *queue = requeued;
        Ok(count)
    }

    /// Whether any list was modified.
    pub fn is_dirty(&self) -> bool {
        [&self.hangouts, &self.unread, &self.offline, &self.in_flight]
            .into_iter()
            .flatten()
            .any(|slot| slot.dirty)
            || self.messages.values().any(|slot| slot.dirty)
            || self.offline_messages.values().any(|slot| slot.dirty)
    }

    /// Write every modified list in one atomic batch.
    ///
    /// Lists that became empty are deleted rather than stored as `[]`.
    pub fn commit(self) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();

        for slot in [&self.hangouts, &self.unread, &self.offline, &self.in_flight]
            .into_iter()
            .flatten()
        {
            slot.stage(&mut batch)?;
        }
        for slot in self.messages.values().chain(self.offline_messages.values()) {
            slot.stage(&mut batch)?;
        }

        if batch.is_empty() {
            return Ok(());
        }

        tracing::trace!(user = %self.user, ops = batch.len(), "committing cache batch");
        self.storage.commit(batch)
    }
}
