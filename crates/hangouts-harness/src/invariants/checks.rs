//! Cache and ledger invariants, checked one client at a time.

use std::collections::BTreeSet;

use hangouts_proto::Hangout;

use super::{ClientSnapshot, Invariant, InvariantResult, Violation};

/// At most one hangout per peer, in the hangout list and in the unread list.
///
/// Every inbound event is an upsert by username. A duplicate means some
/// path appended instead of replacing.
pub struct OneHangoutPerPeer;

impl Invariant for OneHangoutPerPeer {
    fn name(&self) -> &'static str {
        "one_hangout_per_peer"
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        for (list, hangouts) in [("hangouts", &client.hangouts), ("unread", &client.unread)] {
            let mut seen = BTreeSet::new();
            if let Some(dup) = hangouts.iter().find(|h| !seen.insert(h.username.as_str())) {
                let message = format!("{} appears twice in {list}", dup.username);
                return Err(Violation::new(self, client, message));
            }
        }
        Ok(())
    }
}

/// A peer is in the unread list exactly when its hangout is not read.
pub struct UnreadMatchesReadFlag;

impl Invariant for UnreadMatchesReadFlag {
    fn name(&self) -> &'static str {
        "unread_matches_read_flag"
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        let unread: BTreeSet<_> = client.unread.iter().map(|h| h.username.as_str()).collect();

        let listed = |h: &Hangout| unread.contains(h.username.as_str());
        if let Some(h) = client.hangouts.iter().find(|&h| listed(h) == h.read) {
            let (peer, read, listed) = (&h.username, h.read, listed(h));
            return Err(Violation::new(
                self,
                client,
                format!("{peer} has read={read} but unread listing={listed}"),
            ));
        }
        if let Some(peer) = unread.iter().find(|peer| client.hangout(peer).is_none()) {
            return Err(Violation::new(self, client, format!("unread {peer} has no hangout")));
        }
        Ok(())
    }
}

/// The focused hangout is read and never in the unread list.
pub struct FocusedHangoutIsRead;

impl Invariant for FocusedHangoutIsRead {
    fn name(&self) -> &'static str {
        "focused_hangout_is_read"
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        let Some(peer) = client.focused.as_deref() else { return Ok(()) };

        if client.hangout(peer).is_some_and(|h| !h.read) {
            return Err(Violation::new(self, client, format!("focused {peer} is unread")));
        }
        if client.unread.iter().any(|h| h.username == peer) {
            return Err(Violation::new(self, client, format!("focused {peer} in unread list")));
        }
        Ok(())
    }
}

/// While the transport is open the offline queue is empty.
///
/// Entering `OPEN` flushes the queue and online commands are sent directly.
/// The engine's readiness can lag the transport's: a send refused by a
/// transport that already closed is queued until the engine processes the
/// `CLOSED` event, so this only holds at rest. Commands issued with the
/// offline hint while open break it too, so scenarios checking this
/// invariant must not issue them.
pub struct OfflineQueueDrainedWhenOpen;

impl Invariant for OfflineQueueDrainedWhenOpen {
    fn name(&self) -> &'static str {
        "offline_queue_drained_when_open"
    }

    fn at_rest_only(&self) -> bool {
        true
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        if client.ready_state.is_open() && !client.offline.is_empty() {
            return Err(Violation::new(
                self,
                client,
                format!("{} item(s) queued while OPEN", client.offline.len()),
            ));
        }
        Ok(())
    }
}
