//! Application state machine.
//!
//! [`App`] is the state store: the in-memory snapshot the UI renders. It
//! consumes [`crate::AppEvent`]s and produces [`crate::AppAction`]s, with no
//! I/O and no knowledge of the cache or the transport.
//!
//! # Responsibilities
//!
//! - Mirrors the user's hangouts, per-peer messages and unread list.
//! - Tracks transport readiness for the connectivity indicator.
//! - Tracks the focused hangout, the latest route and the pending command.
//! - Holds the last error and a transient status line.

use std::collections::HashMap;

use hangouts_client::IssueCommand;
use hangouts_core::ReadyState;
use hangouts_proto::{Hangout, Message, upsert_hangout};

use crate::{AppAction, AppEvent, Route};

/// Application state machine.
#[derive(Debug, Clone)]
pub struct App {
    /// Local username.
    username: String,
    /// Transport readiness.
    ready_state: ReadyState,
    /// One hangout per peer.
    hangouts: Vec<Hangout>,
    /// Messages by peer.
    messages: HashMap<String, Vec<Message>>,
    /// Unread hangouts.
    unread: Vec<Hangout>,
    /// Peer whose hangout is open.
    focused: Option<String>,
    /// Screen selected by the last routed event.
    route: Option<Route>,
    /// Most recent command awaiting acknowledgement.
    pending: Option<Hangout>,
    /// Commands waiting for the transport.
    queued: usize,
    /// Results of the last search.
    search_results: Vec<Hangout>,
    /// Last error.
    error: Option<String>,
    /// Transient status message.
    status_message: Option<String>,
}

impl App {
    /// Create an empty state store for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ready_state: ReadyState::Closed,
            hangouts: Vec::new(),
            messages: HashMap::new(),
            unread: Vec::new(),
            focused: None,
            route: None,
            pending: None,
            queued: 0,
            search_results: Vec::new(),
            error: None,
            status_message: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Tick => vec![],
            AppEvent::ReadyStateChanged(state) => {
                self.ready_state = state;
                vec![AppAction::Render]
            },
            AppEvent::Restored { hangouts, unread, queued } => {
                self.hangouts = hangouts;
                self.unread = unread;
                self.queued = queued;
                vec![AppAction::Render]
            },
            AppEvent::HangoutUpdated(hangout) => {
                upsert_hangout(&mut self.hangouts, hangout);
                vec![AppAction::Render]
            },
            AppEvent::MessagesUpdated { peer, messages } => {
                self.messages.insert(peer, messages);
                vec![AppAction::Render]
            },
            AppEvent::UnreadUpdated(unread) => {
                self.unread = unread;
                vec![AppAction::Render]
            },
            AppEvent::Route { peer, state } => {
                self.route = Some(Route { peer, state });
                vec![AppAction::Render]
            },
            AppEvent::PendingStarted(hangout) => {
                self.pending = Some(hangout);
                vec![AppAction::Render]
            },
            AppEvent::PendingResolved { peer, timestamp } => {
                self.clear_pending(&peer, timestamp);
                vec![AppAction::Render]
            },
            AppEvent::Queued { peer, command, timestamp } => {
                // A refused send comes back as a queued command.
                self.clear_pending(&peer, timestamp);
                self.queued += 1;
                self.status_message = Some(format!("{command} to {peer} queued until online"));
                vec![AppAction::Render]
            },
            AppEvent::QueueFlushed { count } => {
                self.queued = self.queued.saturating_sub(count);
                self.status_message = Some(format!("Replayed {count} queued command(s)"));
                vec![AppAction::Render]
            },
            AppEvent::Requeued { count } => {
                self.queued += count;
                vec![AppAction::Render]
            },
            AppEvent::DeliveryTimedOut { peer, timestamp } => {
                self.clear_pending(&peer, timestamp);
                self.error = Some(format!("No acknowledgement from {peer}"));
                vec![AppAction::Render]
            },
            AppEvent::SearchResults { query, hangouts } => {
                self.status_message = Some(format!("{} result(s) for \"{query}\"", hangouts.len()));
                self.search_results = hangouts;
                vec![AppAction::Render]
            },
            AppEvent::Error { message } => {
                self.error = Some(message);
                vec![AppAction::Render]
            },
        }
    }

    fn clear_pending(&mut self, peer: &str, timestamp: u64) {
        if self.pending.as_ref().is_some_and(|h| h.username == peer && h.timestamp == timestamp) {
            self.pending = None;
        }
    }

    /// Set a status message to display to the user.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Dismiss the current error.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Connect the transport.
    pub fn connect(&mut self) -> Vec<AppAction> {
        self.ready_state = ReadyState::Connecting;
        vec![AppAction::Connect, AppAction::Render]
    }

    /// Issue a command against a peer.
    pub fn issue_command(&mut self, command: IssueCommand) -> Vec<AppAction> {
        self.error = None;
        vec![AppAction::IssueCommand(command), AppAction::Render]
    }

    /// Open the hangout with `peer`.
    pub fn focus_hangout(&mut self, peer: impl Into<String>) -> Vec<AppAction> {
        let peer = peer.into();
        self.focused = Some(peer.clone());
        vec![AppAction::FocusHangout { peer }, AppAction::Render]
    }

    /// Close the open hangout.
    pub fn leave_hangout(&mut self) -> Vec<AppAction> {
        self.focused = None;
        vec![AppAction::LeaveHangout, AppAction::Render]
    }

    /// Drop `peer` from the unread list without opening it.
    pub fn dismiss_unread(&self, peer: impl Into<String>) -> Vec<AppAction> {
        vec![AppAction::DismissUnread { peer: peer.into() }, AppAction::Render]
    }

    /// Search hangouts by peer name.
    pub fn search(&mut self, query: impl Into<String>) -> Vec<AppAction> {
        let query = query.into();
        self.status_message = Some(format!("Searching for \"{query}\"..."));
        vec![AppAction::Search { query }, AppAction::Render]
    }

    /// Quit the application.
    pub fn quit(&self) -> Vec<AppAction> {
        vec![AppAction::Quit]
    }

    /// Local username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Transport readiness. `as_u8()` gives the 0-3 indicator value.
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// All hangouts, one per peer.
    pub fn hangouts(&self) -> &[Hangout] {
        &self.hangouts
    }

    /// Hangout with `peer`, if any.
    pub fn hangout(&self, peer: &str) -> Option<&Hangout> {
        self.hangouts.iter().find(|h| h.username == peer)
    }

    /// Messages with `peer`. Empty if none are loaded.
    pub fn messages(&self, peer: &str) -> &[Message] {
        self.messages.get(peer).map_or(&[], Vec::as_slice)
    }

    /// Unread hangouts.
    pub fn unread(&self) -> &[Hangout] {
        &self.unread
    }

    /// Peer whose hangout is open.
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Screen selected by the last routed event.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Most recent command awaiting acknowledgement.
    pub fn pending(&self) -> Option<&Hangout> {
        self.pending.as_ref()
    }

    /// Commands waiting for the transport.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Results of the last search.
    pub fn search_results(&self) -> &[Hangout] {
        &self.search_results
    }

    /// Last error. `None` if nothing failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}
