//! Environment abstraction for deterministic testing.
//!
//! Decouples engine logic from the system clock. Production uses
//! [`SystemEnv`]; the simulation harness supplies a virtual clock so that
//! timestamps, and therefore message identities, are reproducible.

use std::time::Duration;

/// Abstract environment providing time and async sleep.
///
/// # Invariants
///
/// - `now_millis()` never goes backwards within one execution context.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in unix milliseconds.
    ///
    /// Hangout and message timestamps are taken from here. Message
    /// timestamps double as message identity, so simulation clocks should
    /// advance between commands.
    fn now_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Only used by driver code (the console input poll), never by engine logic.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Production environment using the system clock and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now_millis(&self) -> u64 {
        // A clock set before 1970 reads as zero rather than failing.
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
