//! Console client for hangouts
//!
//! A thin shell over [`hangouts_app::Driver`] that reads commands from stdin
//! and prints the view to stdout. All orchestration lives in the generic
//! [`hangouts_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod console;
pub mod view;

pub use console::{Backend, ConsoleDriver, ConsoleError};
pub use hangouts_app::{App, AppAction, AppEvent, Driver, Runtime};
