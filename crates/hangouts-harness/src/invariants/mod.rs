//! Invariants over client caches.
//!
//! Each client's cache and engine state is read into a [`ClientSnapshot`];
//! every registered [`Invariant`] is then checked against every client.
//! [`SimWorld`](crate::SimWorld) runs the registry after each step, so a
//! violation points at the step that caused it. Invariants that only hold
//! once every pending event has been processed are checked when the world
//! settles.
//!
//! ```ignore
//! let world = SimWorld::new().with_invariants(InvariantRegistry::standard());
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    FocusedHangoutIsRead, OfflineQueueDrainedWhenOpen, OneHangoutPerPeer, UnreadMatchesReadFlag,
};
pub use snapshot::{ClientSnapshot, SystemSnapshot};

/// Outcome of checking one client.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant on one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Invariant name.
    pub invariant: &'static str,
    /// Client whose state broke it.
    pub user: String,
    /// What was found.
    pub message: String,
}

impl Violation {
    /// Violation of `invariant` on `client`.
    pub fn new(
        invariant: &(impl Invariant + ?Sized),
        client: &ClientSnapshot,
        message: String,
    ) -> Self {
        Self { invariant: invariant.name(), user: client.user.clone(), message }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.user, self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of a single client's state.
pub trait Invariant: Send + Sync {
    /// Name used in violation reports.
    fn name(&self) -> &'static str;

    /// Check `client`.
    fn check(&self, client: &ClientSnapshot) -> InvariantResult;

    /// Holds only once the client has processed every pending event.
    fn at_rest_only(&self) -> bool {
        false
    }
}

/// Invariants checked together.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// [`OneHangoutPerPeer`], [`UnreadMatchesReadFlag`],
    /// [`FocusedHangoutIsRead`] and [`OfflineQueueDrainedWhenOpen`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(OneHangoutPerPeer);
        registry.add(UnreadMatchesReadFlag);
        registry.add(FocusedHangoutIsRead);
        registry.add(OfflineQueueDrainedWhenOpen);
        registry
    }

    /// Register `invariant`.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Every violation across every client, in client order.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        self.check(state, true)
    }

    /// Like [`check_all`](Self::check_all), skipping invariants that only
    /// hold at rest.
    pub fn check_stepwise(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        self.check(state, false)
    }

    fn check(&self, state: &SystemSnapshot, at_rest: bool) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> = state
            .clients
            .iter()
            .flat_map(|client| {
                self.invariants
                    .iter()
                    .filter(|inv| at_rest || !inv.at_rest_only())
                    .filter_map(|inv| inv.check(client).err())
            })
            .collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Panic listing every violation. `context` names the point of the check.
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        fail_on(self.check_all(state), context);
    }

    /// Panic listing every violation of the invariants that hold between
    /// steps.
    pub fn assert_stepwise(&self, state: &SystemSnapshot, context: &str) {
        fail_on(self.check_stepwise(state), context);
    }

    /// Number registered.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[allow(clippy::panic)]
fn fail_on(result: Result<(), Vec<Violation>>, context: &str) {
    if let Err(violations) = result {
        let lines: Vec<_> = violations.iter().map(ToString::to_string).collect();
        panic!("invariants broken {context}:\n  {}", lines.join("\n  "));
    }
}
