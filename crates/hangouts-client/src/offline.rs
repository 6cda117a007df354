//! Readiness changes, offline replay, restore and acknowledgement timeouts.

use hangouts_core::{CacheTxn, ConnectionAction, Environment, ReadyState, Storage};
use hangouts_proto::Message;

use crate::{
    engine::Engine,
    error::EngineError,
    event::{Delivery, EngineAction},
};

impl<S: Storage, E: Environment> Engine<S, E> {
    pub(crate) fn handle_ready_state(
        &mut self,
        state: ReadyState,
    ) -> Result<Vec<EngineAction>, EngineError> {
        if self.connection.state() == state {
            return Ok(Vec::new());
        }

        let mut actions = vec![EngineAction::ConnectionChanged(state)];
        for effect in self.connection.transition(state) {
            match effect {
                ConnectionAction::FlushOfflineQueue => actions.extend(self.flush_offline()?),
                ConnectionAction::RequeueInFlight => {
                    let count = self.requeue_in_flight()?;
                    if count > 0 {
                        actions.push(EngineAction::Requeued { count });
                    }
                },
            }
        }

        Ok(actions)
    }

    /// Replay the offline queue in order. Each item moves to the in-flight
    /// list until its `OFFLINE_ACKN` arrives.
    fn flush_offline(&mut self) -> Result<Vec<EngineAction>, EngineError> {
        let user = self.identity.username.clone();
        let mut txn = CacheTxn::new(&self.storage, &user);
        let queued = txn.take_offline()?;
        txn.commit()?;

        if queued.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!(%user, count = queued.len(), "flushing offline queue");

        Ok(queued
            .into_iter()
            .map(|hangout| {
                EngineAction::Send(self.delivery(hangout.state.command(), hangout, true))
            })
            .collect())
    }

    /// Move unacknowledged replays back to the front of the offline queue.
    fn requeue_in_flight(&mut self) -> Result<usize, EngineError> {
        let user = self.identity.username.clone();
        let mut txn = CacheTxn::new(&self.storage, &user);
        let count = txn.requeue_in_flight()?;
        txn.commit()?;

        if count > 0 {
            tracing::info!(%user, count, "requeued unacknowledged replays");
        }
        Ok(count)
    }

    /// The transport refused `delivery`.
    ///
    /// A command sent online goes to the offline queue, with its message,
    /// and is no longer pending. A replay is already on the in-flight list
    /// and returns to the queue when the transport reports `CLOSED`.
    pub(crate) fn handle_send_failed(
        &mut self,
        delivery: Delivery,
        reason: String,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let user = self.identity.username.clone();
        let Delivery { command, sender, offline, .. } = delivery;
        let peer = sender.username.clone();
        tracing::warn!(%user, %peer, %command, offline, %reason, "send failed");

        let mut actions = vec![EngineAction::Error { message: reason }];
        if offline {
            return Ok(actions);
        }

        let mut txn = CacheTxn::new(&self.storage, &user);
        if let Some(body) = &sender.message {
            let mut message = Message::from_body(body, user.clone());
            message.read = true;
            txn.enqueue_offline_message(&peer, message)?;
        }
        let timestamp = sender.timestamp;
        txn.enqueue_offline(sender)?;
        txn.commit()?;

        self.pending.remove(&(peer.clone(), timestamp));
        tracing::info!(%user, %peer, %command, "queued after failed send");
        actions.push(EngineAction::Queued { peer, command, timestamp });
        Ok(actions)
    }

    /// Report pending deliveries older than the configured timeout.
    pub(crate) fn handle_tick(&mut self, now: u64) -> Vec<EngineAction> {
        let Some(timeout) = self.config.ack_timeout else {
            return Vec::new();
        };
        let timeout = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        let expired: Vec<(String, u64)> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_sub(p.issued_at) >= timeout)
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .map(|key| {
                self.pending.remove(&key);
                let (peer, timestamp) = key;
                let user = &self.identity.username;
                tracing::warn!(%user, %peer, timestamp, "delivery timed out");
                EngineAction::DeliveryTimedOut { peer, timestamp }
            })
            .collect()
    }

    /// Load the cached state at startup. Replays left in flight by a previous
    /// session go back to the offline queue.
    pub(crate) fn handle_restore(&mut self) -> Result<Vec<EngineAction>, EngineError> {
        let user = self.identity.username.clone();
        let mut txn = CacheTxn::new(&self.storage, &user);

        let requeued = txn.requeue_in_flight()?;
        let hangouts = txn.hangouts()?.to_vec();
        let unread = txn.unread()?.to_vec();
        let queued = txn.offline_queue()?.len();
        txn.commit()?;

        tracing::info!(
            %user,
            hangouts = hangouts.len(),
            unread = unread.len(),
            queued,
            requeued,
            "restored cache"
        );
        if let Some(peer) = self.focused.clone() {
            tracing::debug!(%user, %peer, "restore keeps focus");
        }

        let mut actions = vec![EngineAction::Restored { hangouts, unread, queued }];
        if self.connection.state().is_open() {
            actions.extend(self.flush_offline()?);
        }
        Ok(actions)
    }
}
