//! Virtual clock.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use hangouts_core::Environment;

/// Start of simulated time, unix milliseconds.
const EPOCH_MILLIS: u64 = 1_700_000_000_000;

/// Deterministic environment shared by every client in a simulation.
///
/// Time only moves when a test calls [`SimEnv::advance`] or sleeps. Clones
/// share the clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    now: Arc<AtomicU64>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Clock starting at a fixed instant.
    pub fn new() -> Self {
        Self::starting_at(EPOCH_MILLIS)
    }

    /// Clock starting at `millis`.
    pub fn starting_at(millis: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(millis)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.now.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }
}
