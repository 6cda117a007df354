//! Application layer for hangouts
//!
//! Pure state machines and a generic runtime for UI and protocol
//! orchestration, so the same code runs in production and in deterministic
//! simulation.
//!
//! # Components
//!
//! - [`App`]: state store (hangouts, messages, unread list, routing, errors)
//! - [`Bridge`]: protocol bridge (feeds the engine, collects deliveries)
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: generic orchestration loop over a Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod driver;
mod event;
mod runtime;
mod state;

pub use action::AppAction;
pub use app::App;
pub use bridge::Bridge;
pub use driver::Driver;
pub use event::AppEvent;
pub use runtime::Runtime;
pub use state::Route;
