//! Receiving handler: frames from the server.
//!
//! Every hangout carried by a frame is merged the same way:
//!
//! 1. replace the cached hangout for the peer (or append it),
//! 2. mark it read if the peer is focused, otherwise record it as unread,
//! 3. merge its embedded message, by timestamp,
//! 4. route the UI to the state's screen, except for chat states and
//!    hangouts delivered in an unread batch.
//!
//! Acknowledgements additionally resolve the pending command with the same
//! timestamp and state; offline acknowledgements also retire the matching
//! in-flight item. An acknowledgement older than the cached hangout only
//! marks its message delivered.

use hangouts_core::{CacheTxn, Environment, Storage};
use hangouts_proto::{Hangout, Message, ServerFrame};

use crate::{engine::Engine, error::EngineError, event::EngineAction};

/// Where an inbound hangout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inbound {
    /// `ACKHOWLEDGEMENT` for a command we sent online.
    Ack,
    /// `OFFLINE_ACKN` for a command replayed from the offline queue.
    OfflineAck,
    /// `HANGOUT`: a peer's command.
    Peer,
    /// One element of `UNREAD_HANGOUTS`.
    Missed,
}

impl Inbound {
    fn is_ack(self) -> bool {
        matches!(self, Inbound::Ack | Inbound::OfflineAck)
    }
}

impl<S: Storage, E: Environment> Engine<S, E> {
    pub(crate) fn handle_frame(
        &mut self,
        frame: ServerFrame,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let user = &self.identity.username;
        tracing::debug!(%user, frame = frame.type_name(), "frame received");

        match frame {
            ServerFrame::Acknowledgement { hangout } => {
                self.merge_inbound(vec![hangout], Inbound::Ack)
            },
            ServerFrame::OfflineAck { hangout } => {
                self.merge_inbound(vec![hangout], Inbound::OfflineAck)
            },
            ServerFrame::Hangout { hangout } => self.merge_inbound(vec![hangout], Inbound::Peer),
            ServerFrame::UnreadHangouts { hangouts } => {
                self.merge_inbound(hangouts, Inbound::Missed)
            },
            ServerFrame::Error { message } => {
                tracing::warn!(user = %self.identity.username, %message, "server error");
                Ok(vec![EngineAction::Error { message }])
            },
        }
    }

    fn merge_inbound(
        &mut self,
        hangouts: Vec<Hangout>,
        inbound: Inbound,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let user = self.identity.username.clone();
        let mut txn = CacheTxn::new(&self.storage, &user);

        let mut actions = Vec::new();
        let mut routes = Vec::new();
        let mut message_peers: Vec<String> = Vec::new();
        let mut resolved = Vec::new();
        let mut unread_changed = false;

        for mut hangout in hangouts {
            let peer = hangout.username.clone();
            if peer.is_empty() || peer == user {
                tracing::warn!(%user, %peer, "dropping hangout with invalid peer");
                continue;
            }

            let focused = self.focused.as_deref() == Some(peer.as_str());
            hangout.read = focused;
            if inbound.is_ack() {
                hangout.delivered = true;
            }

            let stale = inbound.is_ack()
                && txn.hangout(&peer)?.is_some_and(|cached| cached.timestamp > hangout.timestamp);

            if !stale {
                txn.upsert_hangout(hangout.clone())?;
                if focused {
                    unread_changed |= txn.remove_unread(&peer)?;
                } else {
                    txn.add_unread(hangout.clone())?;
                    unread_changed = true;
                }
            }

            if let Some(body) = &hangout.message {
                let author = if inbound.is_ack() { user.as_str() } else { peer.as_str() };
                let mut message = Message::from_body(body, author);
                message.delivered = true;
                message.read = focused || inbound.is_ack();
                txn.merge_message(&peer, message)?;
                if !message_peers.contains(&peer) {
                    message_peers.push(peer.clone());
                }
            }

            if inbound == Inbound::OfflineAck {
                if !txn.resolve_in_flight(&peer, hangout.state)? {
                    let state = hangout.state;
                    tracing::debug!(%user, %peer, %state, "offline ack without in-flight item");
                }
                if let Some(body) = &hangout.message {
                    txn.remove_offline_message(&peer, body.timestamp)?;
                }
            }

            if inbound.is_ack() {
                resolved.push((peer.clone(), hangout.timestamp, hangout.state));
            }
            if stale {
                let timestamp = hangout.timestamp;
                tracing::debug!(%user, %peer, timestamp, "stale acknowledgement");
                continue;
            }
            if inbound != Inbound::Missed && !hangout.state.is_chat() {
                routes.push(EngineAction::Route { peer: peer.clone(), state: hangout.state });
            }

            actions.push(EngineAction::HangoutUpdated(hangout));
        }

        for peer in message_peers {
            let messages = txn.messages(&peer)?.to_vec();
            actions.push(EngineAction::MessagesUpdated { peer, messages });
        }
        if unread_changed {
            actions.push(EngineAction::UnreadUpdated(txn.unread()?.to_vec()));
        }

        txn.commit()?;

        for (peer, timestamp, state) in resolved {
            let key = (peer, timestamp);
            if self.pending.get(&key).is_some_and(|p| p.hangout.state == state) {
                self.pending.remove(&key);
                actions.push(EngineAction::PendingResolved { peer: key.0, timestamp });
            }
        }
        actions.extend(routes);

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use hangouts_core::Storage;
    use hangouts_proto::{Command, Hangout, HangoutState, MessageBody, ServerFrame};

    use crate::{
        EngineEvent, IssueCommand,
        engine::test_support::{engine, open, sends},
        event::EngineAction,
    };

    fn peer_event(peer: &str, state: HangoutState, timestamp: u64) -> EngineEvent {
        EngineEvent::FrameReceived(ServerFrame::Hangout {
            hangout: Hangout::new(peer, format!("{peer}@example.com"), state, timestamp),
        })
    }

    fn routes(actions: &[EngineAction]) -> Vec<(String, HangoutState)> {
        actions
            .iter()
            .filter_map(|a| match a {
                EngineAction::Route { peer, state } => Some((peer.clone(), *state)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn unfocused_event_becomes_unread() {
        let (mut engine, _) = engine("bob");

        let actions = engine.handle(peer_event("alice", HangoutState::Inviter, 5)).unwrap();

        let cached = engine.storage().hangout("bob", "alice").unwrap().unwrap();
        assert_eq!(cached.state, HangoutState::Inviter);
        assert!(!cached.read);

        let unread = engine.storage().list_unread("bob").unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].username, "alice");
        assert!(!unread[0].read);

        assert_eq!(routes(&actions), vec![("alice".to_string(), HangoutState::Inviter)]);
    }

    #[test]
    fn focused_event_is_read() {
        let (mut engine, _) = engine("bob");
        engine.handle(EngineEvent::FocusHangout { peer: "alice".into() }).unwrap();

        engine.handle(peer_event("alice", HangoutState::Accepter, 5)).unwrap();

        assert!(engine.storage().hangout("bob", "alice").unwrap().unwrap().read);
        assert!(engine.storage().list_unread("bob").unwrap().is_empty());
    }

    #[test]
    fn same_event_twice_is_idempotent() {
        let (mut engine, _) = engine("bob");

        engine.handle(peer_event("alice", HangoutState::Inviter, 5)).unwrap();
        engine.handle(peer_event("alice", HangoutState::Inviter, 5)).unwrap();

        assert_eq!(engine.storage().hangouts("bob").unwrap().len(), 1);
        assert_eq!(engine.storage().list_unread("bob").unwrap().len(), 1);
    }

    #[test]
    fn later_event_replaces_earlier() {
        let (mut engine, _) = engine("bob");

        engine.handle(peer_event("alice", HangoutState::Inviter, 5)).unwrap();
        engine.handle(peer_event("alice", HangoutState::Blocker, 6)).unwrap();

        let hangouts = engine.storage().hangouts("bob").unwrap();
        assert_eq!(hangouts.len(), 1);
        assert_eq!(hangouts[0].state, HangoutState::Blocker);
        assert_eq!(hangouts[0].timestamp, 6);

        let unread = engine.storage().list_unread("bob").unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].state, HangoutState::Blocker);
    }

    #[test]
    fn chat_events_do_not_route() {
        let (mut engine, _) = engine("bob");
        let hangout = Hangout::new("alice", "", HangoutState::Messanger, 5)
            .with_message(Some(MessageBody { text: "hey".into(), timestamp: 5 }));

        let actions =
            engine.handle(EngineEvent::FrameReceived(ServerFrame::Hangout { hangout })).unwrap();

        assert!(routes(&actions).is_empty());
        let messages = engine.storage().messages("bob", "alice").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].username, "alice");
        assert!(!messages[0].read);
    }

    #[test]
    fn peer_message_merges_by_timestamp() {
        let (mut engine, _) = engine("bob");
        let send = |text: &str, timestamp| {
            EngineEvent::FrameReceived(ServerFrame::Hangout {
                hangout: Hangout::new("alice", "", HangoutState::Messanger, timestamp)
                    .with_message(Some(MessageBody { text: text.into(), timestamp })),
            })
        };

        engine.handle(send("one", 1)).unwrap();
        engine.handle(send("two", 2)).unwrap();
        engine.handle(send("one, edited", 1)).unwrap();

        let texts: Vec<_> = engine
            .storage()
            .messages("bob", "alice")
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["one, edited", "two"]);
    }

    #[test]
    fn unread_batch_is_merged_without_routing() {
        let (mut engine, _) = engine("bob");
        let frame = ServerFrame::UnreadHangouts {
            hangouts: vec![
                Hangout::new("alice", "", HangoutState::Inviter, 1),
                Hangout::new("carol", "", HangoutState::Blocker, 2),
                Hangout::new("alice", "", HangoutState::Messanger, 3),
            ],
        };

        let actions = engine.handle(EngineEvent::FrameReceived(frame)).unwrap();

        assert!(routes(&actions).is_empty());
        let hangouts = engine.storage().hangouts("bob").unwrap();
        assert_eq!(hangouts.len(), 2);
        assert_eq!(hangouts[0].state, HangoutState::Messanger);
        assert_eq!(engine.storage().list_unread("bob").unwrap().len(), 2);
    }

    #[test]
    fn acknowledgement_resolves_pending() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);
        let invite = IssueCommand::new(Command::Invite, "bob");
        let actions = engine.handle(EngineEvent::IssueCommand(invite)).unwrap();
        let sent = sends(&actions)[0].clone();

        let ack = ServerFrame::Acknowledgement { hangout: sent.sender.clone() };
        let actions = engine.handle(EngineEvent::FrameReceived(ack)).unwrap();

        assert!(actions.contains(&EngineAction::PendingResolved {
            peer: "bob".into(),
            timestamp: sent.sender.timestamp,
        }));
        assert_eq!(engine.pending().count(), 0);
        let cached = engine.storage().hangout("alice", "bob").unwrap().unwrap();
        assert!(cached.delivered);
        assert_eq!(routes(&actions), vec![("bob".to_string(), HangoutState::Invited)]);
    }

    #[test]
    fn acknowledged_message_is_delivered_and_own() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);
        engine
            .storage()
            .put_hangout("alice", Hangout::new("bob", "", HangoutState::Accepter, 1))
            .unwrap();
        engine.handle(EngineEvent::FocusHangout { peer: "bob".into() }).unwrap();

        let actions = engine
            .handle(EngineEvent::IssueCommand(
                IssueCommand::new(Command::Message, "bob").with_message("hi"),
            ))
            .unwrap();
        let sent = sends(&actions)[0].clone();
        let ack = ServerFrame::Acknowledgement { hangout: sent.sender };
        engine.handle(EngineEvent::FrameReceived(ack)).unwrap();

        let messages = engine.storage().messages("alice", "bob").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].username, "alice");
        assert!(messages[0].delivered);
        assert!(messages[0].read);
    }

    #[test]
    fn ack_resolves_only_its_own_command() {
        let (mut engine, clock) = engine("alice");
        open(&mut engine);
        engine
            .storage()
            .put_hangout("alice", Hangout::new("bob", "", HangoutState::Accepter, 1))
            .unwrap();

        let mut sent = Vec::new();
        for text in ["one", "two"] {
            let actions = engine
                .handle(EngineEvent::IssueCommand(
                    IssueCommand::new(Command::Message, "bob").with_message(text),
                ))
                .unwrap();
            sent.push(sends(&actions)[0].clone());
            clock.set(2_000);
        }

        let actions = engine
            .handle(EngineEvent::FrameReceived(ServerFrame::Acknowledgement {
                hangout: sent[0].sender.clone(),
            }))
            .unwrap();

        assert!(actions.contains(&EngineAction::PendingResolved {
            peer: "bob".into(),
            timestamp: sent[0].sender.timestamp,
        }));
        let still_pending: Vec<_> = engine.pending().map(|h| h.timestamp).collect();
        assert_eq!(still_pending, vec![sent[1].sender.timestamp]);

        // The older ack leaves the newer record in place.
        let cached = engine.storage().hangout("alice", "bob").unwrap().unwrap();
        assert_eq!(cached.message.map(|m| m.text).as_deref(), Some("two"));
        assert!(!cached.delivered);

        let messages = engine.storage().messages("alice", "bob").unwrap();
        let delivered: Vec<_> = messages.iter().map(|m| (m.text.as_str(), m.delivered)).collect();
        assert_eq!(delivered, [("one", true), ("two", false)]);
    }

    #[test]
    fn ack_with_other_state_leaves_pending() {
        let (mut engine, _) = engine("alice");
        open(&mut engine);
        let actions = engine
            .handle(EngineEvent::IssueCommand(IssueCommand::new(Command::Invite, "bob")))
            .unwrap();
        let mut echoed = sends(&actions)[0].sender.clone();
        echoed.state = HangoutState::Blocked;

        engine
            .handle(EngineEvent::FrameReceived(ServerFrame::Acknowledgement { hangout: echoed }))
            .unwrap();

        assert_eq!(engine.pending().count(), 1);
    }

    #[test]
    fn error_frame_is_surfaced() {
        let (mut engine, _) = engine("alice");

        let actions = engine
            .handle(EngineEvent::FrameReceived(ServerFrame::Error { message: "boom".into() }))
            .unwrap();

        assert_eq!(actions, vec![EngineAction::Error { message: "boom".into() }]);
    }

    #[test]
    fn hangout_naming_local_user_is_dropped() {
        let (mut engine, _) = engine("alice");

        engine.handle(peer_event("alice", HangoutState::Inviter, 1)).unwrap();

        assert!(engine.storage().is_empty());
    }
}
