//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O.
//! Each frontend implements it, while the generic [`crate::Runtime`] handles
//! all orchestration.

use std::future::Future;

use hangouts_client::{Delivery, Identity, TransportEvent};
use hangouts_proto::Hangout;

use crate::{App, AppAction};

/// Abstracts I/O operations for the application runtime.
///
/// # Implementations
///
/// - **CLI**: stdin commands, a socket or service transport
/// - **Simulation**: injected input and an in-process relay
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Poll for user input and apply it to `app`.
    ///
    /// Returns the actions the App produced, empty if nothing was ready.
    fn poll_input(
        &mut self,
        app: &mut App,
    ) -> impl Future<Output = Result<Vec<AppAction>, Self::Error>> + Send;

    /// Connect the transport as `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn connect(
        &mut self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Hand one delivery to the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is not open or the send fails.
    fn send(&mut self, delivery: Delivery) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next transport event, or `None` if none is ready.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Search the backend for the local user's hangouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot search; the runtime then
    /// searches the cache.
    fn search(
        &mut self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Hangout>, Self::Error>> + Send;

    /// Current unix milliseconds.
    fn now_millis(&self) -> u64;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Close the transport and clean up resources.
    fn stop(&mut self);
}
