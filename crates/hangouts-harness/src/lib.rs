//! Deterministic simulation harness for hangouts.
//!
//! In-process implementations of the clock, the relay server and the app
//! driver, so the real [`hangouts_app::Runtime`] runs without sockets and
//! every run is reproducible.
//!
//! # Components
//!
//! - [`SimEnv`]: shared virtual clock
//! - [`SimRelay`]: model of the socket server (acks, routing, mailboxes)
//! - [`SimDriver`]: [`hangouts_app::Driver`] fed from injected input
//! - [`SimWorld`]: several clients wired to one relay
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after every
//! step, whatever the scenario. Use [`InvariantRegistry::standard()`] for the
//! cache and ledger invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_relay;
pub mod world;

pub use invariants::{
    ClientSnapshot, FocusedHangoutIsRead, Invariant, InvariantRegistry, InvariantResult,
    OfflineQueueDrainedWhenOpen, OneHangoutPerPeer, SystemSnapshot, UnreadMatchesReadFlag,
    Violation,
};
pub use sim_driver::{SimDriver, SimDriverError, SimHandle, SimInput};
pub use sim_env::SimEnv;
pub use sim_relay::SimRelay;
pub use world::SimWorld;
