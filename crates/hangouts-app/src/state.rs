//! Observable application state types.

use hangouts_proto::{Command, HangoutState, StateFamily};

/// Screen the UI should show after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Peer username.
    pub peer: String,
    /// State that selects the screen.
    pub state: HangoutState,
}

impl Route {
    /// Screen name for the state, e.g. `invitee` for `INVITER`.
    ///
    /// Acknowledgement states show the issuer's confirmation screen,
    /// notification states show the screen for reacting to the peer.
    pub fn screen(&self) -> &'static str {
        match (self.state.family(), self.state.command()) {
            (StateFamily::Acknowledgement, Command::Invite) => "invited",
            (StateFamily::Acknowledgement, Command::Accept) => "accepted",
            (StateFamily::Acknowledgement, Command::Decline) => "declined",
            (StateFamily::Acknowledgement, Command::Block) => "blocked",
            (StateFamily::Acknowledgement, Command::Unblock) => "unblocked",
            (StateFamily::Notification, Command::Invite) => "invitee",
            (StateFamily::Notification, Command::Accept) => "accepter",
            (StateFamily::Notification, Command::Decline) => "decliner",
            (StateFamily::Notification, Command::Block) => "blocker",
            (StateFamily::Notification, Command::Unblock) => "unblocker",
            (_, Command::Message) => "hangchat",
        }
    }
}
