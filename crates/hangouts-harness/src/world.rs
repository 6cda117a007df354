//! Several simulated clients wired to one relay.
//!
//! Each client is a real [`Runtime`] over a [`SimDriver`] and
//! [`MemoryStorage`]. [`SimWorld::step`] advances every runtime one cycle
//! and carries deliveries and relay frames between them, so scenarios read
//! as a sequence of user inputs followed by [`SimWorld::settle`].

use std::collections::BTreeMap;

use hangouts_app::{App, Runtime};
use hangouts_client::{EngineConfig, Identity, IssueCommand};
use hangouts_core::{MemoryStorage, StorageError};

use crate::{
    ClientSnapshot, InvariantRegistry, SimDriver, SimDriverError, SimEnv, SimHandle, SimInput,
    SimRelay, SystemSnapshot,
};

/// Upper bound on cycles per [`SimWorld::settle`] call.
const MAX_SETTLE_STEPS: usize = 1_000;

struct SimClient {
    runtime: Runtime<SimDriver, MemoryStorage, SimEnv>,
    handle: SimHandle,
    quit: bool,
}

/// Simulation of several clients and a relay.
pub struct SimWorld {
    env: SimEnv,
    relay: SimRelay,
    clients: BTreeMap<String, SimClient>,
    invariants: Option<InvariantRegistry>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// Empty world on a fresh clock.
    pub fn new() -> Self {
        Self {
            env: SimEnv::new(),
            relay: SimRelay::new(),
            clients: BTreeMap::new(),
            invariants: None,
        }
    }

    /// Check these invariants after every step.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Shared clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// Add a client with the default engine configuration.
    pub fn add_client(&mut self, user: &str) -> SimHandle {
        self.add_client_with(user, EngineConfig::default())
    }

    /// Add a client. It starts restored and disconnected.
    pub fn add_client_with(&mut self, user: &str, config: EngineConfig) -> SimHandle {
        let driver = SimDriver::new(self.env.clone());
        let handle = driver.handle();
        let identity = Identity::new(user, format!("{user}@example.com"));
        let mut runtime =
            Runtime::new(driver, self.env.clone(), MemoryStorage::new(), identity, config);
        runtime.restore();

        self.clients
            .insert(user.to_string(), SimClient { runtime, handle: handle.clone(), quit: false });
        handle
    }

    /// Queue input for `user`. Unknown users are ignored.
    pub fn input(&self, user: &str, input: SimInput) {
        if let Some(client) = self.clients.get(user) {
            client.handle.inject_input(input);
        }
    }

    /// Queue a command for `user`.
    pub fn command(&self, user: &str, command: IssueCommand) {
        self.input(user, SimInput::Command(command));
    }

    /// Connect `user`.
    pub fn connect(&self, user: &str) {
        self.input(user, SimInput::Connect);
    }

    /// Drop `user`'s connection.
    pub fn disconnect(&mut self, user: &str) {
        if let Some(client) = self.clients.get(user) {
            client.handle.drop_connection();
        }
        self.relay.disconnect(user);
    }

    /// Make the relay lose (or stop losing) `user`'s deliveries while the
    /// connection stays up.
    pub fn lose_traffic(&mut self, user: &str, lose: bool) {
        self.relay.lose_from(user, lose);
    }

    /// App state of `user`.
    pub fn app(&self, user: &str) -> Option<&App> {
        self.clients.get(user).map(|c| c.runtime.app())
    }

    /// Driver handle of `user`.
    pub fn handle(&self, user: &str) -> Option<&SimHandle> {
        self.clients.get(user).map(|c| &c.handle)
    }

    /// Run one cycle of every client, then move traffic through the relay.
    pub async fn step(&mut self) -> Result<(), SimDriverError> {
        for client in self.clients.values_mut() {
            if !client.quit {
                client.quit = client.runtime.step().await?;
            }
        }
        self.pump();
        self.env.advance(std::time::Duration::from_millis(1));
        self.check_invariants("after step", false);
        Ok(())
    }

    /// Step until no client has pending input or transport events.
    pub async fn settle(&mut self) -> Result<(), SimDriverError> {
        for _ in 0..MAX_SETTLE_STEPS {
            if !self.clients.values().any(|c| !c.quit && c.handle.has_pending()) {
                self.check_invariants("at rest", true);
                return Ok(());
            }
            self.step().await?;
        }
        Err(SimDriverError(format!("no quiescence after {MAX_SETTLE_STEPS} steps")))
    }

    fn pump(&mut self) {
        let mut frames = Vec::new();

        for (user, client) in &self.clients {
            for _ in 0..client.handle.take_connects() {
                frames.extend(self.relay.connect(user));
            }
        }
        for (user, client) in &self.clients {
            for delivery in client.handle.take_outgoing() {
                frames.extend(self.relay.deliver(user, &delivery));
            }
        }

        for (to, frame) in frames {
            if let Some(client) = self.clients.get(&to) {
                client.handle.inject_frame(frame);
            }
        }
    }

    /// Snapshot of every client's cache.
    pub fn snapshot(&self) -> Result<SystemSnapshot, StorageError> {
        let clients = self
            .clients
            .iter()
            .map(|(user, client)| {
                let engine = client.runtime.bridge().engine();
                let (ready_state, focused) = (engine.ready_state(), engine.focused());
                ClientSnapshot::from_storage(engine.storage(), user, ready_state, focused)
            })
            .collect::<Result<_, _>>()?;
        Ok(SystemSnapshot::from_clients(clients))
    }

    /// Cache of `user`.
    pub fn storage(&self, user: &str) -> Option<&MemoryStorage> {
        self.clients.get(user).map(|c| c.runtime.bridge().engine().storage())
    }

    fn check_invariants(&self, context: &str, at_rest: bool) {
        let Some(registry) = &self.invariants else { return };
        match self.snapshot() {
            Ok(snapshot) if at_rest => registry.assert_all(&snapshot, context),
            Ok(snapshot) => registry.assert_stepwise(&snapshot, context),
            Err(e) => tracing::warn!(error = %e, "snapshot failed, invariants skipped"),
        }
    }
}
