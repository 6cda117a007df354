//! Hangouts protocol types
//!
//! Data model and wire format shared by the synchronization engine, the cache
//! and both transports. Everything here is plain data: no I/O, no clocks.
//!
//! # Components
//!
//! - [`Command`] and [`HangoutState`]: the six user verbs and the twelve
//!   relationship states they produce, with the pure command mapper
//!   [`Command::states`].
//! - [`Hangout`] and [`Message`]: the records persisted per user and per peer.
//! - [`CommandFrame`] and [`ServerFrame`]: JSON frames exchanged with the
//!   socket server.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod errors;
pub mod frame;
pub mod hangout;

pub use command::{Command, CommandStates, HangoutState, StateFamily};
pub use errors::{ProtocolError, Result};
pub use frame::{CommandFrame, ServerFrame};
pub use hangout::{
    Hangout, Message, MessageBody, MessageKind, Upsert, merge_message, upsert_hangout,
};
