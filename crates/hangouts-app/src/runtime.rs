//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: UI state machine
//! - [`Bridge`]: Protocol bridge to the engine
//! - [`Driver`]: Platform-specific I/O

use hangouts_client::{EngineConfig, Identity, TransportEvent};
use hangouts_core::{Environment, ReadyState, Storage};

use crate::{App, AppAction, AppEvent, Bridge, Driver};

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `S`: Cache storage
/// - `E`: Environment for timestamps
pub struct Runtime<D, S, E>
where
    D: Driver,
    S: Storage,
    E: Environment,
{
    driver: D,
    app: App,
    bridge: Bridge<S, E>,
    identity: Identity,
}

impl<D, S, E> Runtime<D, S, E>
where
    D: Driver,
    S: Storage,
    E: Environment,
{
    /// Create a new runtime for `identity`.
    pub fn new(driver: D, env: E, storage: S, identity: Identity, config: EngineConfig) -> Self {
        let app = App::new(identity.username.clone());
        let bridge = Bridge::new(env, storage, identity.clone(), config);
        Self { driver, app, bridge, identity }
    }

    /// Run the main event loop.
    ///
    /// 1. Restores the cached state and renders it
    /// 2. Connects the transport
    /// 3. Cycles input, transport events and ticks until the App quits
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.restore();
        self.driver.render(&self.app)?;
        self.connect().await?;

        loop {
            let should_quit = self.step().await?;
            if should_quit {
                break;
            }
        }

        self.driver.stop();
        Ok(())
    }

    /// Load the cached state into the App.
    pub fn restore(&mut self) {
        let events = self.bridge.restore();
        for event in events {
            let actions = self.app.handle(event);
            self.process_actions_sync(actions);
        }
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn step(&mut self) -> Result<bool, D::Error> {
        let actions = self.driver.poll_input(&mut self.app).await?;
        if !actions.is_empty() && self.process_actions(actions).await? {
            return Ok(true);
        }

        if let Some(event) = self.driver.recv().await {
            let events = match event {
                TransportEvent::Open => self.bridge.on_ready_state(ReadyState::Open),
                TransportEvent::Closed => self.bridge.on_ready_state(ReadyState::Closed),
                TransportEvent::Error(reason) => self.bridge.on_transport_error(reason),
                TransportEvent::Frame(frame) => self.bridge.on_incoming_event(frame),
            };
            self.send_outgoing().await?;
            if self.process_bridge_events(events).await? {
                return Ok(true);
            }
        }

        let now = self.driver.now_millis();
        let events = self.bridge.handle_tick(now);
        if self.process_bridge_events(events).await? {
            return Ok(true);
        }

        Ok(false)
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app)?,
                    AppAction::Quit => return Ok(true),
                    AppAction::Connect => self.connect().await?,
                    AppAction::Search { query } => {
                        let events = self.search(&query).await;
                        for event in events {
                            pending_actions.extend(self.app.handle(event));
                        }
                    },

                    // Cache operations go through the bridge
                    AppAction::IssueCommand(_)
                    | AppAction::FocusHangout { .. }
                    | AppAction::LeaveHangout
                    | AppAction::DismissUnread { .. } => {
                        let events = self.bridge.process_app_action(action);
                        for event in events {
                            pending_actions.extend(self.app.handle(event));
                        }
                        self.send_outgoing().await?;
                    },
                }
            }
        }
        Ok(false)
    }

    /// Process actions synchronously (for use in sync contexts).
    fn process_actions_sync(&mut self, actions: Vec<AppAction>) {
        for action in actions {
            match action {
                AppAction::Render => {
                    if let Err(e) = self.driver.render(&self.app) {
                        tracing::warn!("Failed to render: {:?}", e);
                    }
                },
                AppAction::Quit => {},

                AppAction::Connect
                | AppAction::IssueCommand(_)
                | AppAction::FocusHangout { .. }
                | AppAction::LeaveHangout
                | AppAction::DismissUnread { .. }
                | AppAction::Search { .. } => {
                    tracing::warn!("Unexpected action in sync context: {:?}", action);
                },
            }
        }
    }

    /// Process events from Bridge back to App.
    async fn process_bridge_events(&mut self, events: Vec<AppEvent>) -> Result<bool, D::Error> {
        for event in events {
            let actions = self.app.handle(event);
            if self.process_actions(actions).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Connect the transport.
    ///
    /// A refused connection is reported to the App and leaves the engine
    /// `CLOSED`, so commands keep queueing.
    async fn connect(&mut self) -> Result<(), D::Error> {
        let events = self.bridge.on_ready_state(ReadyState::Connecting);
        for event in events {
            let actions = self.app.handle(event);
            self.process_actions_sync(actions);
        }

        if let Err(e) = self.driver.connect(&self.identity).await {
            tracing::warn!(user = %self.identity.username, error = %e, "connect failed");
            let mut events = self.bridge.on_ready_state(ReadyState::Closed);
            events.push(AppEvent::Error { message: e.to_string() });
            for event in events {
                let actions = self.app.handle(event);
                self.process_actions_sync(actions);
            }
        }
        Ok(())
    }

    /// Search the backend, falling back to the cache when it cannot.
    async fn search(&mut self, query: &str) -> Vec<AppEvent> {
        match self.driver.search(query).await {
            Ok(hangouts) => vec![AppEvent::SearchResults { query: query.to_string(), hangouts }],
            Err(e) => {
                tracing::debug!(%query, error = %e, "remote search unavailable, using cache");
                self.bridge.search_cached(query)
            },
        }
    }

    /// Hand all pending deliveries to the driver.
    ///
    /// The engine's readiness can lag the transport's, so a refused delivery
    /// goes back to the engine, which queues it for the next `OPEN`.
    async fn send_outgoing(&mut self) -> Result<(), D::Error> {
        let deliveries = self.bridge.take_outgoing();
        for delivery in deliveries {
            if let Err(e) = self.driver.send(delivery.clone()).await {
                tracing::warn!(peer = %delivery.peer(), error = %e, "send failed");
                let events = self.bridge.on_send_failed(delivery, e.to_string());
                for event in events {
                    let actions = self.app.handle(event);
                    self.process_actions_sync(actions);
                }
            }
        }
        Ok(())
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a mutable reference to the App
    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<S, E> {
        &self.bridge
    }
}
