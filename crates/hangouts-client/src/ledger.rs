//! Read/unread ledger: focus, leave and dismiss.

use hangouts_core::{CacheTxn, Environment, Storage};

use crate::{engine::Engine, error::EngineError, event::EngineAction};

impl<S: Storage, E: Environment> Engine<S, E> {
    /// Focus the hangout with `peer`: it and all its messages become read
    /// and it leaves the unread list, in one batch.
    pub(crate) fn handle_focus(&mut self, peer: &str) -> Result<Vec<EngineAction>, EngineError> {
        let user = self.identity.username.clone();
        tracing::debug!(%user, %peer, "focusing hangout");

        let mut txn = CacheTxn::new(&self.storage, &user);
        let mut actions = Vec::new();

        if let Some(hangout) = txn.update_hangout(peer, |h| h.read = true)? {
            actions.push(EngineAction::HangoutUpdated(hangout));
        }
        txn.mark_messages_read(peer)?;
        actions.push(EngineAction::MessagesUpdated {
            peer: peer.to_string(),
            messages: txn.messages(peer)?.to_vec(),
        });
        if txn.remove_unread(peer)? {
            actions.push(EngineAction::UnreadUpdated(txn.unread()?.to_vec()));
        }

        txn.commit()?;
        self.focused = Some(peer.to_string());

        Ok(actions)
    }

    /// Clear the focus. Later events for the peer count as unread again.
    pub(crate) fn handle_leave(&mut self) -> Vec<EngineAction> {
        if let Some(peer) = self.focused.take() {
            tracing::debug!(user = %self.identity.username, %peer, "left hangout");
        }
        Vec::new()
    }

    /// Drop `peer` from the unread list without focusing it.
    pub(crate) fn handle_dismiss(&mut self, peer: &str) -> Result<Vec<EngineAction>, EngineError> {
        let user = self.identity.username.clone();
        let mut txn = CacheTxn::new(&self.storage, &user);
        let mut actions = Vec::new();

        if !txn.remove_unread(peer)? {
            return Ok(actions);
        }
        if let Some(hangout) = txn.update_hangout(peer, |h| h.read = true)? {
            actions.push(EngineAction::HangoutUpdated(hangout));
        }
        actions.push(EngineAction::UnreadUpdated(txn.unread()?.to_vec()));

        txn.commit()?;
        Ok(actions)
    }
}
