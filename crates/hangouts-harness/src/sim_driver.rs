//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` stands in for the console driver in deterministic tests. It
//! implements [`Driver`] so the same [`hangouts_app::Runtime`] orchestration
//! code runs in both production and simulation. Tests keep a [`SimHandle`]
//! to inject input and transport events and to collect deliveries after the
//! runtime has taken ownership of the driver.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hangouts_app::{App, AppAction, Driver};
use hangouts_client::{Delivery, Identity, IssueCommand, TransportEvent};
use hangouts_core::Environment;
use hangouts_proto::{Hangout, ServerFrame};

use crate::SimEnv;

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// User input, applied to the App through its intent methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimInput {
    /// Connect the transport.
    Connect,
    /// Issue a command.
    Command(IssueCommand),
    /// Open the hangout with a peer.
    Focus(String),
    /// Close the open hangout.
    Leave,
    /// Dismiss a peer's unread entry.
    Dismiss(String),
    /// Search by peer name.
    Search(String),
    /// Quit.
    Quit,
}

/// Shared state for event injection.
///
/// This allows injection from outside async contexts.
#[derive(Default)]
struct SharedState {
    inputs: VecDeque<SimInput>,
    incoming: VecDeque<TransportEvent>,
    outgoing: Vec<Delivery>,
    connected: bool,
    connects: usize,
    refuse_connect: bool,
    remote_search: Option<Vec<Hangout>>,
    renders: usize,
}

/// Test-side handle onto a [`SimDriver`].
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SharedState>>,
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue user input.
    pub fn inject_input(&self, input: SimInput) {
        self.lock().inputs.push_back(input);
    }

    /// Queue a transport event.
    pub fn inject_event(&self, event: TransportEvent) {
        self.lock().incoming.push_back(event);
    }

    /// Queue a frame from the server.
    pub fn inject_frame(&self, frame: ServerFrame) {
        self.inject_event(TransportEvent::Frame(frame));
    }

    /// The connection drops: sends fail and the runtime sees `Closed`.
    pub fn drop_connection(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.incoming.push_back(TransportEvent::Closed);
    }

    /// Refuse (or allow again) connection attempts.
    pub fn refuse_connect(&self, refuse: bool) {
        self.lock().refuse_connect = refuse;
    }

    /// Serve `results` for every remote search. `None` makes remote search
    /// fail so the runtime searches the cache.
    pub fn set_remote_search(&self, results: Option<Vec<Hangout>>) {
        self.lock().remote_search = results;
    }

    /// Take all captured outgoing deliveries.
    pub fn take_outgoing(&self) -> Vec<Delivery> {
        std::mem::take(&mut self.lock().outgoing)
    }

    /// Number of successful connects since the last call.
    pub fn take_connects(&self) -> usize {
        std::mem::take(&mut self.lock().connects)
    }

    /// Whether the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Check if there is input or transport events left to process.
    pub fn has_pending(&self) -> bool {
        let state = self.lock();
        !state.inputs.is_empty() || !state.incoming.is_empty()
    }

    /// Number of renders so far.
    pub fn renders(&self) -> usize {
        self.lock().renders
    }
}

/// Simulation driver for deterministic testing.
pub struct SimDriver {
    handle: SimHandle,
    env: SimEnv,
}

impl SimDriver {
    /// Create a driver reading time from `env`.
    pub fn new(env: SimEnv) -> Self {
        Self { handle: SimHandle { state: Arc::new(Mutex::new(SharedState::default())) }, env }
    }

    /// Handle for injecting input after the runtime owns the driver.
    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn poll_input(&mut self, app: &mut App) -> Result<Vec<AppAction>, Self::Error> {
        let input = self.handle.lock().inputs.pop_front();

        Ok(match input {
            None => vec![],
            Some(SimInput::Connect) => app.connect(),
            Some(SimInput::Command(command)) => app.issue_command(command),
            Some(SimInput::Focus(peer)) => app.focus_hangout(peer),
            Some(SimInput::Leave) => app.leave_hangout(),
            Some(SimInput::Dismiss(peer)) => app.dismiss_unread(peer),
            Some(SimInput::Search(query)) => app.search(query),
            Some(SimInput::Quit) => app.quit(),
        })
    }

    async fn connect(&mut self, identity: &Identity) -> Result<(), Self::Error> {
        let mut state = self.handle.lock();
        if state.refuse_connect {
            return Err(SimDriverError(format!("connection refused for {}", identity.username)));
        }
        state.connected = true;
        state.connects += 1;
        state.incoming.push_back(TransportEvent::Open);
        Ok(())
    }

    async fn send(&mut self, delivery: Delivery) -> Result<(), Self::Error> {
        let mut state = self.handle.lock();
        if !state.connected {
            return Err(SimDriverError("not connected".into()));
        }
        state.outgoing.push(delivery);
        Ok(())
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.handle.lock().incoming.pop_front()
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Hangout>, Self::Error> {
        let needle = query.to_lowercase();
        match &self.handle.lock().remote_search {
            Some(results) => Ok(results
                .iter()
                .filter(|h| h.username.to_lowercase().contains(&needle))
                .cloned()
                .collect()),
            None => Err(SimDriverError("remote search unavailable".into())),
        }
    }

    fn now_millis(&self) -> u64 {
        self.env.now_millis()
    }

    fn render(&mut self, _app: &App) -> Result<(), Self::Error> {
        self.handle.lock().renders += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.handle.lock().connected = false;
    }
}
