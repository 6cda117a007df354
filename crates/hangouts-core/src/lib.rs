//! Hangouts core
//!
//! Everything the synchronization engine needs from its surroundings, kept
//! free of network I/O:
//!
//! - [`env`]: clock abstraction so the engine can run under a virtual clock.
//! - [`connection`]: transport readiness (`CONNECTING`/`OPEN`/`CLOSING`/
//!   `CLOSED`) as a small state machine that tells the engine when to flush
//!   or requeue offline work.
//! - [`storage`]: the persistent cache. A synchronous key/value [`Storage`]
//!   trait with memory, redb and fault-injecting backends.
//! - [`cache`]: [`CacheTxn`], which stages every list a handler touches and
//!   commits them as one atomic batch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod connection;
pub mod env;
pub mod error;
pub mod storage;

pub use cache::CacheTxn;
pub use connection::{Connection, ConnectionAction, ReadyState};
pub use env::{Environment, SystemEnv};
pub use error::ConnectionError;
pub use storage::{
    BatchOp, CacheKey, ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError,
    WriteBatch,
};
