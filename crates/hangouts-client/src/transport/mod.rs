//! Transports for the engine.
//!
//! Two backends sit behind one [`Transport`] trait:
//!
//! - [`SocketTransport`]: the custom WebSocket server, which speaks
//!   [`CommandFrame`](hangouts_proto::CommandFrame) and
//!   [`ServerFrame`](hangouts_proto::ServerFrame) JSON directly.
//! - [`ServiceTransport`]: a hosted backend reached over REST, with a
//!   live-query subscription for peer events.
//!
//! Both translate their traffic into [`TransportEvent`]s so the runtime can
//! feed readiness changes and frames into the engine without knowing which
//! backend is in use. This layer carries no protocol logic.

mod service;
mod socket;

use std::future::Future;

use hangouts_core::ReadyState;
use hangouts_proto::Hangout;
use thiserror::Error;

pub use self::{
    service::{ServiceConfig, ServiceTransport},
    socket::{SocketConfig, SocketTransport},
};
pub use crate::event::TransportEvent;
use crate::{Delivery, Identity};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Send attempted while readiness is not `OPEN`.
    #[error("transport is not open ({0})")]
    NotOpen(ReadyState),

    /// Malformed frame or payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Backend request failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The connection task has stopped.
    #[error("transport closed")]
    Closed,
}

/// A connection to one hangouts backend.
pub trait Transport: Send {
    /// Connect as `identity`.
    ///
    /// Readiness is `CONNECTING` while this runs. [`TransportEvent::Open`] is
    /// reported through [`recv`](Transport::recv) once the backend accepts.
    fn connect(
        &mut self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send one command.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotOpen`] unless readiness is `OPEN`.
    fn send(
        &mut self,
        delivery: &Delivery,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next event, or `None` once the transport has shut down.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Hangouts of the local user whose peer name matches `query`.
    fn search(
        &mut self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Hangout>, TransportError>> + Send;

    /// Current readiness.
    fn ready_state(&self) -> ReadyState;

    /// Close the connection. Readiness moves to `CLOSING`, then `CLOSED`.
    fn close(&mut self);
}

/// Readiness shared between a transport and its I/O tasks.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedReadyState(std::sync::Arc<std::sync::atomic::AtomicU8>);

impl SharedReadyState {
    pub(crate) fn new(state: ReadyState) -> Self {
        let shared = Self::default();
        shared.set(state);
        shared
    }

    pub(crate) fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(std::sync::atomic::Ordering::Acquire))
            .unwrap_or(ReadyState::Closed)
    }

    pub(crate) fn set(&self, state: ReadyState) {
        self.0.store(state.as_u8(), std::sync::atomic::Ordering::Release);
    }
}
