//! Protocol-to-Application translation layer.
//!
//! The [`Bridge`] wraps the sans-IO [`Engine`] and adapts it to the
//! application lifecycle.
//!
//! # Responsibilities
//!
//! - Feeds [`crate::AppAction`]s and transport events into the engine.
//! - Accumulates outgoing [`Delivery`]s for the driver to send in the next
//!   I/O cycle.
//! - Converts engine actions and errors into [`crate::AppEvent`]s for the
//!   state store.

use hangouts_client::{
    Delivery, Engine, EngineAction, EngineConfig, EngineError, EngineEvent, Identity,
    IssueCommand,
};
use hangouts_core::{Environment, ReadyState, Storage};
use hangouts_proto::ServerFrame;

use crate::{AppAction, AppEvent};

/// Bridge between App and engine logic.
///
/// Generic over storage and environment to support both production and
/// simulation.
pub struct Bridge<S: Storage, E: Environment> {
    engine: Engine<S, E>,
    outgoing: Vec<Delivery>,
}

impl<S: Storage, E: Environment> Bridge<S, E> {
    /// Create a bridge for `identity` over `storage`.
    pub fn new(env: E, storage: S, identity: Identity, config: EngineConfig) -> Self {
        Self { engine: Engine::new(env, storage, identity, config), outgoing: Vec::new() }
    }

    /// Local user.
    pub fn identity(&self) -> &Identity {
        self.engine.identity()
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Engine<S, E> {
        &self.engine
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        match action {
            AppAction::IssueCommand(command) => self.issue_command(command),
            AppAction::FocusHangout { peer } => self.on_focus_hangout(peer),
            AppAction::LeaveHangout => self.on_leave_hangout(),
            AppAction::DismissUnread { peer } => self.on_dismiss_unread(peer),
            AppAction::Search { query } => self.search_cached(&query),
            AppAction::Render | AppAction::Quit | AppAction::Connect => vec![],
        }
    }

    /// Apply a locally issued command.
    pub fn issue_command(&mut self, command: IssueCommand) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::IssueCommand(command))
    }

    /// The user opened the hangout with `peer`.
    pub fn on_focus_hangout(&mut self, peer: impl Into<String>) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::FocusHangout { peer: peer.into() })
    }

    /// The user left the open hangout.
    pub fn on_leave_hangout(&mut self) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::LeaveHangout)
    }

    /// The user dismissed the unread entry for `peer`.
    pub fn on_dismiss_unread(&mut self, peer: impl Into<String>) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::DismissUnread { peer: peer.into() })
    }

    /// Handle a frame from the transport.
    pub fn on_incoming_event(&mut self, frame: ServerFrame) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::FrameReceived(frame))
    }

    /// Transport readiness changed.
    pub fn on_ready_state(&mut self, state: ReadyState) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::ConnectionChanged(state))
    }

    /// The transport failed outside of a readiness change.
    pub fn on_transport_error(&mut self, reason: impl Into<String>) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::TransportError { reason: reason.into() })
    }

    /// The driver could not send `delivery`.
    pub fn on_send_failed(
        &mut self,
        delivery: Delivery,
        reason: impl Into<String>,
    ) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::SendFailed { delivery, reason: reason.into() })
    }

    /// Load the cached state.
    pub fn restore(&mut self) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::Restore)
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: u64) -> Vec<AppEvent> {
        self.dispatch(EngineEvent::Tick { now })
    }

    /// Search the cache for hangouts matching `query`.
    pub fn search_cached(&self, query: &str) -> Vec<AppEvent> {
        match self.engine.search_cached(query) {
            Ok(hangouts) => vec![AppEvent::SearchResults { query: query.to_string(), hangouts }],
            Err(e) => vec![AppEvent::Error { message: e.to_string() }],
        }
    }

    /// Take pending outgoing deliveries.
    pub fn take_outgoing(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.outgoing)
    }

    fn dispatch(&mut self, event: EngineEvent) -> Vec<AppEvent> {
        let result = self.engine.handle(event);
        self.handle_engine_result(result)
    }

    fn handle_engine_result(
        &mut self,
        result: Result<Vec<EngineAction>, EngineError>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_engine_actions(actions),
            Err(e) => vec![AppEvent::Error { message: e.to_string() }],
        }
    }

    fn process_engine_actions(&mut self, actions: Vec<EngineAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        let mut replayed = 0;

        for action in actions {
            match action {
                EngineAction::Send(delivery) => {
                    if delivery.offline {
                        replayed += 1;
                    }
                    self.outgoing.push(delivery);
                },
                EngineAction::HangoutUpdated(hangout) => {
                    events.push(AppEvent::HangoutUpdated(hangout));
                },
                EngineAction::MessagesUpdated { peer, messages } => {
                    events.push(AppEvent::MessagesUpdated { peer, messages });
                },
                EngineAction::UnreadUpdated(unread) => {
                    events.push(AppEvent::UnreadUpdated(unread));
                },
                EngineAction::Route { peer, state } => {
                    events.push(AppEvent::Route { peer, state });
                },
                EngineAction::PendingStarted(hangout) => {
                    events.push(AppEvent::PendingStarted(hangout));
                },
                EngineAction::PendingResolved { peer, timestamp } => {
                    events.push(AppEvent::PendingResolved { peer, timestamp });
                },
                EngineAction::Queued { peer, command, timestamp } => {
                    events.push(AppEvent::Queued { peer, command, timestamp });
                },
                EngineAction::Requeued { count } => {
                    events.push(AppEvent::Requeued { count });
                },
                EngineAction::DeliveryTimedOut { peer, timestamp } => {
                    events.push(AppEvent::DeliveryTimedOut { peer, timestamp });
                },
                EngineAction::Restored { hangouts, unread, queued } => {
                    events.push(AppEvent::Restored { hangouts, unread, queued });
                },
                EngineAction::ConnectionChanged(state) => {
                    events.push(AppEvent::ReadyStateChanged(state));
                },
                EngineAction::Error { message } => {
                    events.push(AppEvent::Error { message });
                },
            }
        }

        if replayed > 0 {
            events.push(AppEvent::QueueFlushed { count: replayed });
        }
        events
    }
}
