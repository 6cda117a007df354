//! In-process model of the hangouts socket server.
//!
//! The relay does what the real server does for each command frame:
//! acknowledges it to the sender and forwards the recipient's record to the
//! peer. Records for peers that are not connected wait in a mailbox and are
//! handed over as one `UNREAD_HANGOUTS` batch when the peer connects.

use std::collections::{BTreeMap, BTreeSet};

use hangouts_client::Delivery;
use hangouts_proto::{Hangout, ServerFrame, upsert_hangout};

/// Frames the relay emits, addressed by username.
pub type Outbox = Vec<(String, ServerFrame)>;

/// Simulated relay server.
#[derive(Debug, Default)]
pub struct SimRelay {
    online: BTreeSet<String>,
    lossy: BTreeSet<String>,
    mailboxes: BTreeMap<String, Vec<Hangout>>,
    relayed: usize,
}

impl SimRelay {
    /// Relay with nobody connected.
    pub fn new() -> Self {
        Self::default()
    }

    /// `user` connected. Returns the mailbox batch, if any.
    pub fn connect(&mut self, user: &str) -> Outbox {
        self.online.insert(user.to_string());
        match self.mailboxes.remove(user) {
            Some(hangouts) if !hangouts.is_empty() => {
                tracing::debug!(%user, count = hangouts.len(), "delivering mailbox");
                vec![(user.to_string(), ServerFrame::UnreadHangouts { hangouts })]
            },
            _ => Vec::new(),
        }
    }

    /// `user` disconnected.
    pub fn disconnect(&mut self, user: &str) {
        self.online.remove(user);
    }

    /// Silently lose (or stop losing) every delivery from `user`.
    pub fn lose_from(&mut self, user: &str, lose: bool) {
        if lose {
            self.lossy.insert(user.to_string());
        } else {
            self.lossy.remove(user);
        }
    }

    /// Whether `user` is connected.
    pub fn is_online(&self, user: &str) -> bool {
        self.online.contains(user)
    }

    /// Records waiting for `user`.
    pub fn mailbox(&self, user: &str) -> &[Hangout] {
        self.mailboxes.get(user).map_or(&[], Vec::as_slice)
    }

    /// Number of deliveries relayed so far.
    pub fn relayed(&self) -> usize {
        self.relayed
    }

    /// Relay one delivery from `from`.
    ///
    /// A sender that is not connected gets nothing back; the delivery is
    /// dropped as the real socket would drop it.
    pub fn deliver(&mut self, from: &str, delivery: &Delivery) -> Outbox {
        if !self.is_online(from) {
            tracing::warn!(
                %from,
                peer = %delivery.peer(),
                "delivery from disconnected user dropped"
            );
            return Vec::new();
        }
        if self.lossy.contains(from) {
            tracing::debug!(%from, peer = %delivery.peer(), "delivery lost");
            return Vec::new();
        }
        self.relayed += 1;

        let mut out = Vec::new();
        let peer = delivery.peer().to_string();
        let target = delivery.target.clone();

        if self.is_online(&peer) {
            out.push((peer, ServerFrame::Hangout { hangout: target }));
        } else {
            upsert_hangout(self.mailboxes.entry(peer).or_default(), target);
        }

        let mut ack = delivery.sender.clone();
        ack.delivered = true;
        let ack = if delivery.offline {
            ServerFrame::OfflineAck { hangout: ack }
        } else {
            ServerFrame::Acknowledgement { hangout: ack }
        };
        out.push((from.to_string(), ack));
        out
    }
}
