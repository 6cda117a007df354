//! Application side-effects and intents.
//!
//! [`AppAction`] is what the [`crate::App`] state machine asks the runtime to
//! do.

use hangouts_client::IssueCommand;

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Connect the transport.
    Connect,

    /// Issue a relationship command or message.
    IssueCommand(IssueCommand),

    /// Open the hangout with a peer.
    FocusHangout {
        /// Peer username.
        peer: String,
    },

    /// Close the open hangout.
    LeaveHangout,

    /// Drop a peer from the unread list without opening it.
    DismissUnread {
        /// Peer username.
        peer: String,
    },

    /// Search the local user's hangouts by peer name.
    Search {
        /// Case-insensitive fragment of the peer name.
        query: String,
    },
}
