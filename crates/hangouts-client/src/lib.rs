//! Client
//!
//! Action-based hangout synchronization engine. Keeps the local relationship
//! cache, applies the acknowledgement protocol, reconciles read/unread state
//! and replays work performed while offline.
//!
//! # Architecture
//!
//! The engine follows the Sans-IO and Action-Based patterns of
//! [`hangouts_core`]. It receives events ([`EngineEvent`]), processes them
//! against the cache, and returns actions ([`EngineAction`]) for the caller
//! to execute. It never touches the network.
//!
//! # Components
//!
//! - [`Engine`]: top-level state machine for one local user
//! - [`EngineEvent`]: commands, inbound frames, readiness changes, ticks
//! - [`EngineAction`]: deliveries to send and state updates for the UI
//! - [`Delivery`]: one command with both relationship records
//! - [`TransportEvent`]: what a transport reports back
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::SocketTransport`]: custom WebSocket server
//! - [`transport::ServiceTransport`]: hosted backend over REST and live query

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod deliver;
mod engine;
mod error;
mod event;
mod ledger;
mod offline;
mod receive;

#[cfg(feature = "transport")]
pub mod transport;

pub use engine::{Engine, EngineConfig, Identity, TransitionPolicy};
pub use error::EngineError;
pub use event::{Delivery, EngineAction, EngineEvent, IssueCommand, TransportEvent};
pub use hangouts_core::{Environment, ReadyState, Storage};
