//! Delivering handler: commands issued by the local user.

use hangouts_core::{CacheTxn, Environment, Storage};
use hangouts_proto::{Command, Hangout, HangoutState, Message, MessageBody, MessageKind};

use crate::{
    engine::{Engine, Pending, TransitionPolicy},
    error::EngineError,
    event::{EngineAction, IssueCommand},
};

impl<S: Storage, E: Environment> Engine<S, E> {
    /// Apply a locally issued command.
    ///
    /// Writes the sender-side record (and message) to the cache, then either
    /// hands a [`Delivery`](crate::Delivery) to the transport or appends the
    /// record to the offline queue.
    pub(crate) fn handle_issue_command(
        &mut self,
        request: IssueCommand,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let IssueCommand { command, peer, email, message, online_hint } = request;
        let peer = peer.trim().to_string();

        if peer.is_empty() {
            return Err(EngineError::EmptyPeer);
        }
        if peer == self.identity.username {
            return Err(EngineError::SelfCommand { command });
        }

        let user = self.identity.username.clone();
        tracing::debug!(%user, %peer, %command, "issuing command");

        // Taken before the transaction borrows the cache.
        let timestamp = self.next_timestamp();

        let mut txn = CacheTxn::new(&self.storage, &user);
        let current = txn.hangout(&peer)?;
        let current_state = current.as_ref().map(|h| h.state);

        if command == Command::Message && current_state == Some(HangoutState::Blocker) {
            return self.answer_blocked_message(txn, &peer, message.unwrap_or_default(), timestamp);
        }

        if self.config.policy == TransitionPolicy::Strict && !command.allowed_from(current_state) {
            tracing::warn!(%user, %peer, %command, current = ?current_state, "rejected transition");
            return Err(EngineError::IllegalTransition { command, peer, current: current_state });
        }

        let email =
            if email.is_empty() { current.map(|h| h.email).unwrap_or_default() } else { email };
        let body = message.map(|text| MessageBody { text, timestamp });

        let mut sender = Hangout::new(peer.clone(), email, command.states().sender, timestamp)
            .with_message(body.clone());
        sender.read = true;

        let mut actions = Vec::new();

        txn.upsert_hangout(sender.clone())?;
        actions.push(EngineAction::HangoutUpdated(sender.clone()));

        if txn.remove_unread(&peer)? {
            actions.push(EngineAction::UnreadUpdated(txn.unread()?.to_vec()));
        }

        let own_message = body.as_ref().map(|body| {
            let mut message = Message::from_body(body, user.clone());
            message.read = true;
            message
        });
        if let Some(message) = &own_message {
            txn.merge_message(&peer, message.clone())?;
            actions.push(EngineAction::MessagesUpdated {
                peer: peer.clone(),
                messages: txn.messages(&peer)?.to_vec(),
            });
        }

        let send_now = online_hint && self.connection.state().is_open();
        if !send_now {
            txn.enqueue_offline(sender.clone())?;
            if let Some(message) = own_message {
                txn.enqueue_offline_message(&peer, message)?;
            }
        }

        txn.commit()?;

        if send_now {
            let pending = Pending { hangout: sender.clone(), issued_at: timestamp };
            self.pending.insert((peer, timestamp), pending);
            actions.push(EngineAction::PendingStarted(sender.clone()));
            actions.push(EngineAction::Send(self.delivery(command, sender, false)));
        } else {
            tracing::info!(%user, peer = %sender.username, %command, "queued while offline");
            actions.push(EngineAction::Queued { peer: sender.username, command, timestamp });
        }

        Ok(actions)
    }

    /// The peer has blocked the local user: keep the message locally with a
    /// notice tag and send nothing.
    fn answer_blocked_message(
        &self,
        mut txn: CacheTxn<'_, S>,
        peer: &str,
        text: String,
        timestamp: u64,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let notice = Message {
            text,
            timestamp,
            username: self.identity.username.clone(),
            read: true,
            delivered: false,
            kind: Some(MessageKind::Blocker),
        };

        txn.merge_message(peer, notice)?;
        let messages = txn.messages(peer)?.to_vec();
        txn.commit()?;

        tracing::debug!(user = %self.identity.username, %peer, "message to blocker kept locally");
        Ok(vec![EngineAction::MessagesUpdated { peer: peer.to_string(), messages }])
    }
}

#[cfg(test)]
mod tests {
    use hangouts_core::{ReadyState, Storage};
    use hangouts_proto::{Command, HangoutState, MessageKind};

    use crate::{
        EngineConfig, EngineError, EngineEvent, IssueCommand, TransitionPolicy,
        engine::test_support::{engine, engine_with, open, sends},
        event::EngineAction,
    };

    fn issue(cmd: IssueCommand) -> EngineEvent {
        EngineEvent::IssueCommand(cmd)
    }

    #[test]
    fn online_invite_is_sent_and_pending() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);

        let actions = engine
            .handle(issue(IssueCommand::new(Command::Invite, "bob").with_email("bob@x")))
            .unwrap();

        let sent = sends(&actions);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender.state, HangoutState::Invited);
        assert_eq!(sent[0].target.state, HangoutState::Inviter);
        assert!(!sent[0].offline);

        let cached = engine.storage().hangout("alice", "bob").unwrap().unwrap();
        assert_eq!(cached.state, HangoutState::Invited);
        assert!(cached.read);
        assert!(!cached.delivered);
        assert_eq!(cached.email, "bob@x");

        assert_eq!(engine.pending().count(), 1);
        assert!(engine.storage().offline_queue("alice").unwrap().is_empty());
    }

    #[test]
    fn offline_command_is_queued() {
        let (mut engine, _) = engine("alice");

        let actions = engine.handle(issue(IssueCommand::new(Command::Invite, "bob"))).unwrap();

        assert!(sends(&actions).is_empty());
        assert!(actions.iter().any(|a| matches!(
            a,
            EngineAction::Queued { peer, command: Command::Invite, .. } if peer == "bob"
        )));
        assert_eq!(engine.storage().offline_queue("alice").unwrap().len(), 1);
        assert_eq!(engine.pending().count(), 0);
    }

    #[test]
    fn offline_hint_wins_over_open_transport() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);

        let actions =
            engine.handle(issue(IssueCommand::new(Command::Invite, "bob").online(false))).unwrap();

        assert!(sends(&actions).is_empty());
        assert_eq!(engine.storage().offline_queue("alice").unwrap().len(), 1);
    }

    #[test]
    fn message_is_cached_and_queued_with_offline_copy() {
        let (mut engine, _) = engine_with("alice", EngineConfig {
            policy: TransitionPolicy::Permissive,
            ack_timeout: None,
        });

        let command = IssueCommand::new(Command::Message, "bob").with_message("hi");
        engine.handle(issue(command)).unwrap();

        let messages = engine.storage().messages("alice", "bob").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].username, "alice");
        assert_eq!(messages[0].text, "hi");
        assert_eq!(engine.storage().offline_messages("alice", "bob").unwrap(), messages);

        let queued = engine.storage().offline_queue("alice").unwrap();
        assert_eq!(queued[0].message.as_ref().map(|m| m.text.as_str()), Some("hi"));
    }

    #[test]
    fn message_to_blocker_stays_local() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);
        engine
            .storage()
            .put_hangout("alice", hangouts_proto::Hangout::new("bob", "", HangoutState::Blocker, 1))
            .unwrap();

        let actions = engine
            .handle(issue(IssueCommand::new(Command::Message, "bob").with_message("hello?")))
            .unwrap();

        assert!(sends(&actions).is_empty());
        assert_eq!(engine.pending().count(), 0);
        assert!(engine.storage().offline_queue("alice").unwrap().is_empty());

        let messages = engine.storage().messages("alice", "bob").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, Some(MessageKind::Blocker));
        assert_eq!(messages[0].username, "alice");
        assert!(!messages[0].delivered);

        // The relationship itself is unchanged.
        let cached = engine.storage().hangout("alice", "bob").unwrap().unwrap();
        assert_eq!(cached.state, HangoutState::Blocker);
    }

    #[test]
    fn strict_policy_rejects_without_writing() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);

        let err = engine.handle(issue(IssueCommand::new(Command::Accept, "bob"))).unwrap_err();

        assert_eq!(err, EngineError::IllegalTransition {
            command: Command::Accept,
            peer: "bob".into(),
            current: None,
        });
        assert!(engine.storage().is_empty());
        assert_eq!(engine.pending().count(), 0);
    }

    #[test]
    fn permissive_policy_applies_anything() {
        let (mut engine, _) = engine_with("alice", EngineConfig {
            policy: TransitionPolicy::Permissive,
            ack_timeout: None,
        });
        open(&mut engine);

        let actions = engine.handle(issue(IssueCommand::new(Command::Accept, "bob"))).unwrap();

        assert_eq!(sends(&actions).len(), 1);
        assert_eq!(
            engine.storage().hangout("alice", "bob").unwrap().map(|h| h.state),
            Some(HangoutState::Accepted)
        );
    }

    #[test]
    fn replacing_keeps_one_hangout_per_peer() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);
        engine
            .storage()
            .put_hangout(
                "alice",
                hangouts_proto::Hangout::new("bob", "b@x", HangoutState::Inviter, 1),
            )
            .unwrap();

        engine.handle(issue(IssueCommand::new(Command::Accept, "bob"))).unwrap();

        let hangouts = engine.storage().hangouts("alice").unwrap();
        assert_eq!(hangouts.len(), 1);
        assert_eq!(hangouts[0].state, HangoutState::Accepted);
        assert_eq!(hangouts[0].email, "b@x", "cached email kept when none supplied");
    }

    #[test]
    fn issuing_clears_unread_entry() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);
        let mut invite = hangouts_proto::Hangout::new("bob", "", HangoutState::Inviter, 1);
        invite.read = false;
        engine.handle(EngineEvent::FrameReceived(hangouts_proto::ServerFrame::Hangout {
            hangout: invite,
        }))
        .unwrap();
        assert_eq!(engine.storage().list_unread("alice").unwrap().len(), 1);

        let actions = engine.handle(issue(IssueCommand::new(Command::Accept, "bob"))).unwrap();

        assert!(actions.contains(&EngineAction::UnreadUpdated(Vec::new())));
        assert!(engine.storage().list_unread("alice").unwrap().is_empty());
    }

    #[test]
    fn empty_and_self_targets_are_rejected() {
        let (mut engine, _) = engine("alice");

        assert_eq!(
            engine.handle(issue(IssueCommand::new(Command::Invite, "  "))).unwrap_err(),
            EngineError::EmptyPeer
        );
        assert_eq!(
            engine.handle(issue(IssueCommand::new(Command::Invite, "alice"))).unwrap_err(),
            EngineError::SelfCommand { command: Command::Invite }
        );
    }

    #[test]
    fn closing_transport_queues_new_commands() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);
        engine.handle(EngineEvent::ConnectionChanged(ReadyState::Closing)).unwrap();

        let actions = engine.handle(issue(IssueCommand::new(Command::Invite, "bob"))).unwrap();

        assert!(sends(&actions).is_empty());
        assert_eq!(engine.storage().offline_queue("alice").unwrap().len(), 1);
    }
}
