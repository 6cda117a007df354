//! WebSocket transport for the custom hangouts server.

use futures::{SinkExt, StreamExt};
use hangouts_core::ReadyState;
use hangouts_proto::{Hangout, ServerFrame};
use tokio::{sync::mpsc, task::AbortHandle};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{SharedReadyState, Transport, TransportError, TransportEvent};
use crate::{Delivery, Identity};

/// Channel depth for frames in each direction.
const CHANNEL_CAPACITY: usize = 64;

/// Socket server settings.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Base URL, e.g. `ws://localhost:3000`.
    pub url: String,
}

/// One WebSocket per local user.
///
/// A reader and a writer task bridge the socket to channels; the transport
/// itself only holds channel ends and the shared readiness.
pub struct SocketTransport {
    config: SocketConfig,
    state: SharedReadyState,
    outgoing: Option<mpsc::Sender<String>>,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: mpsc::Receiver<TransportEvent>,
    tasks: Vec<AbortHandle>,
}

impl SocketTransport {
    /// Create a closed transport.
    pub fn new(config: SocketConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            config,
            state: SharedReadyState::new(ReadyState::Closed),
            outgoing: None,
            events_tx,
            events_rx,
            tasks: Vec::new(),
        }
    }

    fn stop_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// `<base>/hangouts?username=<user>&email=<email>`
pub(crate) fn socket_url(base: &str, identity: &Identity) -> Result<Url, TransportError> {
    let mut url =
        Url::parse(base).map_err(|e| TransportError::Connection(format!("invalid url: {e}")))?;

    url.path_segments_mut()
        .map_err(|()| TransportError::Connection(format!("url cannot be a base: {base}")))?
        .pop_if_empty()
        .push("hangouts");
    url.query_pairs_mut()
        .append_pair("username", &identity.username)
        .append_pair("email", &identity.email);

    Ok(url)
}

impl Transport for SocketTransport {
    async fn connect(&mut self, identity: &Identity) -> Result<(), TransportError> {
        self.stop_tasks();
        let url = socket_url(&self.config.url, identity)?;

        self.state.set(ReadyState::Connecting);
        tracing::info!(user = %identity.username, %url, "connecting to socket server");

        let (stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(e) => {
                self.state.set(ReadyState::Closed);
                return Err(TransportError::Connection(e.to_string()));
            },
        };

        let (mut sink, mut source) = stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let state = self.state.clone();
        let events = self.events_tx.clone();
        let writer = tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "socket write failed");
                    let _ = events.send(TransportEvent::Error(e.to_string())).await;
                    break;
                }
            }
            state.set(ReadyState::Closing);
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "socket close failed");
            }
        });

        let state = self.state.clone();
        let events = self.events_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "socket read failed");
                        let _ = events.send(TransportEvent::Error(e.to_string())).await;
                        break;
                    },
                };

                let event = match ServerFrame::decode(text.as_str()) {
                    Ok(frame) => TransportEvent::Frame(frame),
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable server frame");
                        TransportEvent::Error(TransportError::Protocol(e.to_string()).to_string())
                    },
                };
                if events.send(event).await.is_err() {
                    break;
                }
            }

            state.set(ReadyState::Closed);
            let _ = events.send(TransportEvent::Closed).await;
        });

        self.tasks = vec![writer.abort_handle(), reader.abort_handle()];
        self.outgoing = Some(outgoing_tx);
        self.state.set(ReadyState::Open);
        self.events_tx.send(TransportEvent::Open).await.map_err(|_| TransportError::Closed)?;

        Ok(())
    }

    async fn send(&mut self, delivery: &Delivery) -> Result<(), TransportError> {
        let state = self.state.get();
        if !state.is_open() {
            return Err(TransportError::NotOpen(state));
        }
        let Some(outgoing) = &self.outgoing else {
            return Err(TransportError::NotOpen(state));
        };

        let text =
            delivery.to_frame().encode().map_err(|e| TransportError::Protocol(e.to_string()))?;
        tracing::debug!(
            peer = %delivery.peer(),
            command = %delivery.command,
            offline = delivery.offline,
            "sending command"
        );

        outgoing.send(text).await.map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Hangout>, TransportError> {
        tracing::debug!(%query, "socket server has no search endpoint");
        Err(TransportError::Request("search is not offered by the socket server".into()))
    }

    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn close(&mut self) {
        if self.outgoing.take().is_some() {
            self.state.set(ReadyState::Closing);
            tracing::info!("closing socket");
        }
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}
