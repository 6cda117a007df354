//! Commands and relationship states.
//!
//! A [`Command`] is a verb issued by the local user against one peer. Every
//! command assigns one state to its issuer and one to its recipient:
//!
//! ```text
//! INVITE   -> INVITED   / INVITER
//! ACCEPT   -> ACCEPTED  / ACCEPTER
//! DECLINE  -> DECLINED  / DECLINER
//! BLOCK    -> BLOCKED   / BLOCKER
//! UNBLOCK  -> UNBLOCKED / UNBLOCKER
//! MESSAGE  -> MESSAGED  / MESSANGER
//! ```
//!
//! A hangout's state is simply overwritten by the last processed command or
//! event. Whether a locally issued command is legal from the current state is
//! answered by [`Command::allowed_from`]; enforcing it is the engine's choice.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// A user-issued verb that initiates a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Invite a peer to a hangout.
    Invite,
    /// Accept a pending invitation.
    Accept,
    /// Decline a pending invitation.
    Decline,
    /// Block a peer.
    Block,
    /// Lift a block on a peer.
    Unblock,
    /// Send a chat message.
    Message,
}

/// States assigned by one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStates {
    /// State recorded on the issuer's side, keyed by the peer.
    pub sender: HangoutState,
    /// State recorded on the recipient's side, keyed by the issuer.
    pub target: HangoutState,
}

impl Command {
    /// All six commands, in declaration order.
    pub const ALL: [Command; 6] = [
        Command::Invite,
        Command::Accept,
        Command::Decline,
        Command::Block,
        Command::Unblock,
        Command::Message,
    ];

    /// Map a command to the pair of states it assigns.
    ///
    /// Pure and total over the closed enum.
    pub const fn states(self) -> CommandStates {
        let (sender, target) = match self {
            Command::Invite => (HangoutState::Invited, HangoutState::Inviter),
            Command::Accept => (HangoutState::Accepted, HangoutState::Accepter),
            Command::Decline => (HangoutState::Declined, HangoutState::Decliner),
            Command::Block => (HangoutState::Blocked, HangoutState::Blocker),
            Command::Unblock => (HangoutState::Unblocked, HangoutState::Unblocker),
            Command::Message => (HangoutState::Messaged, HangoutState::Messanger),
        };
        CommandStates { sender, target }
    }

    /// Whether issuing this command is a legal transition from `current`.
    ///
    /// `None` means no hangout exists yet for the peer. A `MESSAGE` from
    /// `BLOCKER` is legal here: the engine answers it locally instead of
    /// sending it.
    pub fn allowed_from(self, current: Option<HangoutState>) -> bool {
        use HangoutState as S;

        match self {
            Command::Invite => matches!(
                current,
                None | Some(S::Declined | S::Decliner | S::Unblocked | S::Unblocker)
            ),
            Command::Accept | Command::Decline => current == Some(S::Inviter),
            Command::Block => current != Some(S::Blocked),
            Command::Unblock => current == Some(S::Blocked),
            Command::Message => matches!(
                current,
                Some(
                    S::Accepted
                        | S::Accepter
                        | S::Messaged
                        | S::Messanger
                        | S::Unblocked
                        | S::Unblocker
                        | S::Blocker
                )
            ),
        }
    }

    /// Wire name of the command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::Invite => "INVITE",
            Command::Accept => "ACCEPT",
            Command::Decline => "DECLINE",
            Command::Block => "BLOCK",
            Command::Unblock => "UNBLOCK",
            Command::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnrecognizedCommand(s.to_string()))
    }
}

/// Which side of a command a state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFamily {
    /// Assigned to the issuer once the remote side accepts the command.
    Acknowledgement,
    /// Assigned to the recipient of a peer's command.
    Notification,
}

/// Relationship state between the local user and one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HangoutState {
    /// Local user invited the peer.
    Invited,
    /// Local user accepted the peer's invitation.
    Accepted,
    /// Local user declined the peer's invitation.
    Declined,
    /// Local user blocked the peer.
    Blocked,
    /// Local user unblocked the peer.
    Unblocked,
    /// Local user messaged the peer.
    Messaged,
    /// Peer invited the local user.
    Inviter,
    /// Peer accepted the local user's invitation.
    Accepter,
    /// Peer declined the local user's invitation.
    Decliner,
    /// Peer blocked the local user.
    Blocker,
    /// Peer messaged the local user.
    Messanger,
    /// Peer unblocked the local user.
    Unblocker,
}

impl HangoutState {
    /// All twelve states.
    pub const ALL: [HangoutState; 12] = [
        HangoutState::Invited,
        HangoutState::Accepted,
        HangoutState::Declined,
        HangoutState::Blocked,
        HangoutState::Unblocked,
        HangoutState::Messaged,
        HangoutState::Inviter,
        HangoutState::Accepter,
        HangoutState::Decliner,
        HangoutState::Blocker,
        HangoutState::Messanger,
        HangoutState::Unblocker,
    ];

    /// Side of the command this state belongs to.
    pub const fn family(self) -> StateFamily {
        match self {
            HangoutState::Invited
            | HangoutState::Accepted
            | HangoutState::Declined
            | HangoutState::Blocked
            | HangoutState::Unblocked
            | HangoutState::Messaged => StateFamily::Acknowledgement,
            HangoutState::Inviter
            | HangoutState::Accepter
            | HangoutState::Decliner
            | HangoutState::Blocker
            | HangoutState::Messanger
            | HangoutState::Unblocker => StateFamily::Notification,
        }
    }

    /// The command that produces this state, on either side.
    pub const fn command(self) -> Command {
        match self {
            HangoutState::Invited | HangoutState::Inviter => Command::Invite,
            HangoutState::Accepted | HangoutState::Accepter => Command::Accept,
            HangoutState::Declined | HangoutState::Decliner => Command::Decline,
            HangoutState::Blocked | HangoutState::Blocker => Command::Block,
            HangoutState::Unblocked | HangoutState::Unblocker => Command::Unblock,
            HangoutState::Messaged | HangoutState::Messanger => Command::Message,
        }
    }

    /// Steady chat state. Events in this state do not switch screens.
    pub const fn is_chat(self) -> bool {
        matches!(self, HangoutState::Messaged | HangoutState::Messanger)
    }

    /// Wire name of the state.
    pub const fn as_str(self) -> &'static str {
        match self {
            HangoutState::Invited => "INVITED",
            HangoutState::Accepted => "ACCEPTED",
            HangoutState::Declined => "DECLINED",
            HangoutState::Blocked => "BLOCKED",
            HangoutState::Unblocked => "UNBLOCKED",
            HangoutState::Messaged => "MESSAGED",
            HangoutState::Inviter => "INVITER",
            HangoutState::Accepter => "ACCEPTER",
            HangoutState::Decliner => "DECLINER",
            HangoutState::Blocker => "BLOCKER",
            HangoutState::Messanger => "MESSANGER",
            HangoutState::Unblocker => "UNBLOCKER",
        }
    }
}

impl fmt::Display for HangoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HangoutState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HangoutState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnrecognizedState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapper_assigns_one_state_per_family() {
        for command in Command::ALL {
            let states = command.states();
            assert_eq!(states.sender.family(), StateFamily::Acknowledgement);
            assert_eq!(states.target.family(), StateFamily::Notification);
            assert_eq!(states.sender.command(), command);
            assert_eq!(states.target.command(), command);
        }
    }

    #[test]
    fn mapper_is_deterministic() {
        for command in Command::ALL {
            assert_eq!(command.states(), command.states());
        }
    }

    #[test]
    fn invite_maps_to_invited_and_inviter() {
        let states = Command::Invite.states();
        assert_eq!(states.sender, HangoutState::Invited);
        assert_eq!(states.target, HangoutState::Inviter);
    }

    #[test]
    fn message_maps_to_chat_states() {
        let states = Command::Message.states();
        assert!(states.sender.is_chat());
        assert!(states.target.is_chat());
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = "POKE".parse::<Command>().unwrap_err();
        assert_eq!(err, ProtocolError::UnrecognizedCommand("POKE".into()));
    }

    #[test]
    fn command_parse_ignores_case() {
        assert_eq!("unblock".parse::<Command>().unwrap(), Command::Unblock);
        assert_eq!("MESSAGE".parse::<Command>().unwrap(), Command::Message);
    }

    #[test]
    fn state_names_round_trip_through_parse() {
        for state in HangoutState::ALL {
            assert_eq!(state.as_str().parse::<HangoutState>().unwrap(), state);
        }
    }

    #[test]
    fn invite_only_from_fresh_or_reset_states() {
        assert!(Command::Invite.allowed_from(None));
        assert!(Command::Invite.allowed_from(Some(HangoutState::Decliner)));
        assert!(!Command::Invite.allowed_from(Some(HangoutState::Invited)));
        assert!(!Command::Invite.allowed_from(Some(HangoutState::Blocked)));
    }

    #[test]
    fn accept_requires_pending_invitation() {
        assert!(Command::Accept.allowed_from(Some(HangoutState::Inviter)));
        assert!(!Command::Accept.allowed_from(None));
        assert!(!Command::Decline.allowed_from(Some(HangoutState::Invited)));
    }

    #[test]
    fn message_rejected_while_blocking() {
        assert!(!Command::Message.allowed_from(Some(HangoutState::Blocked)));
        assert!(!Command::Message.allowed_from(None));
        assert!(Command::Message.allowed_from(Some(HangoutState::Blocker)));
        assert!(Command::Message.allowed_from(Some(HangoutState::Accepter)));
    }

    #[test]
    fn unblock_only_when_blocked() {
        assert!(Command::Unblock.allowed_from(Some(HangoutState::Blocked)));
        assert!(!Command::Unblock.allowed_from(Some(HangoutState::Blocker)));
        assert!(Command::Block.allowed_from(Some(HangoutState::Blocker)));
        assert!(!Command::Block.allowed_from(Some(HangoutState::Blocked)));
    }
}
