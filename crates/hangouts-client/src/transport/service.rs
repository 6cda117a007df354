//! Hosted backend transport: REST writes and searches, live-query events.
//!
//! Each user owns one `Hangout` object per peer, found by `owner` and
//! `username`. A send writes two objects, the issuer's record and the
//! recipient's record, updating them in place when they exist. The write
//! response stands in for the server acknowledgement. The recipient learns
//! about the command through its live-query subscription on objects it owns.
//!
//! Connecting registers the user in the `HangoutUser` collection, which is
//! also where a peer's email is looked up when the local record lacks one.
//!
//! Every object carries `lastWriter`; notifications for objects the local
//! user wrote itself are dropped since the write response already covered
//! them.

use futures::{SinkExt, StreamExt};
use hangouts_core::ReadyState;
use hangouts_proto::{Hangout, ServerFrame};
use serde_json::{Value, json};
use tokio::{sync::mpsc, task::AbortHandle};
use tokio_tungstenite::tungstenite::Message;

use super::{SharedReadyState, Transport, TransportError, TransportEvent};
use crate::{Delivery, Identity};

const CHANNEL_CAPACITY: usize = 64;

/// Collection holding relationship records.
const HANGOUT_CLASS: &str = "Hangout";

/// Collection holding one profile per user.
const USER_CLASS: &str = "HangoutUser";

/// Hosted backend settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// REST endpoint, e.g. `https://api.example.com/parse`.
    pub server_url: String,
    /// Live-query WebSocket endpoint.
    pub live_query_url: String,
    /// Application id sent with every request.
    pub application_id: String,
    /// Opaque session credential for the local user.
    pub session_token: String,
    /// Maximum search results.
    pub search_limit: usize,
}

/// Transport over the hosted backend.
pub struct ServiceTransport {
    config: ServiceConfig,
    http: reqwest::Client,
    identity: Option<Identity>,
    state: SharedReadyState,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: mpsc::Receiver<TransportEvent>,
    live_query: Option<AbortHandle>,
}

impl ServiceTransport {
    /// Create a closed transport.
    pub fn new(config: ServiceConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            config,
            http: reqwest::Client::new(),
            identity: None,
            state: SharedReadyState::new(ReadyState::Closed),
            events_tx,
            events_rx,
            live_query: None,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{path}", self.config.server_url.trim_end_matches('/'));
        self.http
            .request(method, url)
            .header("X-Parse-Application-Id", &self.config.application_id)
            .header("X-Parse-Session-Token", &self.config.session_token)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, TransportError> {
        let response =
            request.send().await.map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Request(format!("{status}: {body}")));
        }
        response.json().await.map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn query(
        &self,
        class: &str,
        filter: &Value,
        limit: usize,
    ) -> Result<Value, TransportError> {
        let filter = filter.to_string();
        let limit = limit.to_string();
        let request = self
            .request(reqwest::Method::GET, &format!("classes/{class}"))
            .query(&[("where", filter.as_str()), ("limit", limit.as_str())]);
        self.execute(request).await
    }

    /// Update the object matching `filter` in place, or create it.
    async fn write(
        &self,
        class: &str,
        filter: &Value,
        object: &Value,
    ) -> Result<(), TransportError> {
        let existing = first_object_id(&self.query(class, filter, 1).await?);
        let (method, path) = write_target(class, existing.as_deref());
        tracing::trace!(%method, %path, "writing object");

        self.execute(self.request(method, &path).json(object)).await.map(drop)
    }

    /// Registered email of `username`, if the user has a profile.
    async fn lookup_email(&self, username: &str) -> Result<Option<String>, TransportError> {
        let body = self.query(USER_CLASS, &user_filter(username), 1).await?;
        Ok(first_result(&body)
            .and_then(|user| user.get("email"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// Backend object for one relationship record.
pub(crate) fn hangout_object(owner: &str, writer: &str, hangout: &Hangout) -> Value {
    json!({
        "owner": owner,
        "lastWriter": writer,
        "username": hangout.username,
        "email": hangout.email,
        "message": hangout.message,
        "state": hangout.state,
        "timestamp": hangout.timestamp,
        "delivered": hangout.delivered,
        "read": hangout.read,
    })
}

/// Constraint selecting the record `owner` keeps about `username`.
pub(crate) fn record_filter(owner: &str, username: &str) -> Value {
    json!({ "owner": owner, "username": username })
}

/// Constraint selecting the profile of `username`.
pub(crate) fn user_filter(username: &str) -> Value {
    json!({ "username": username })
}

/// Backend profile for the local user.
pub(crate) fn user_object(identity: &Identity) -> Value {
    json!({ "username": identity.username, "email": identity.email })
}

/// Method and path writing an object of `class`: an update when the object
/// already exists, a create otherwise.
pub(crate) fn write_target(class: &str, object_id: Option<&str>) -> (reqwest::Method, String) {
    match object_id {
        Some(id) => (reqwest::Method::PUT, format!("classes/{class}/{id}")),
        None => (reqwest::Method::POST, format!("classes/{class}")),
    }
}

fn first_result(body: &Value) -> Option<&Value> {
    body.get("results").and_then(Value::as_array).and_then(|results| results.first())
}

/// Id of the first object in a query response.
pub(crate) fn first_object_id(body: &Value) -> Option<String> {
    first_result(body)
        .and_then(|object| object.get("objectId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Relationship record from a backend object. Backend-only fields are
/// ignored.
pub(crate) fn hangout_from_object(object: &Value) -> Result<Hangout, TransportError> {
    serde_json::from_value(object.clone()).map_err(|e| TransportError::Protocol(e.to_string()))
}

/// Escape `query` for use as a literal inside a backend regex.
pub(crate) fn escape_regex(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Search constraint: the user's records whose peer matches `query`,
/// ignoring case.
pub(crate) fn search_filter(owner: &str, query: &str) -> Value {
    json!({
        "owner": owner,
        "username": { "$regex": escape_regex(query), "$options": "i" },
    })
}

/// What one live-query message means for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notice {
    /// Session accepted by the live-query server.
    Connected,
    /// A peer changed a record owned by the local user.
    Hangout(Hangout),
    /// Live-query server error.
    Error(String),
    /// Nothing to report.
    Ignored,
}

/// Interpret one live-query message for `user`.
pub(crate) fn live_query_notice(message: &Value, user: &str) -> Notice {
    let op = message.get("op").and_then(Value::as_str).unwrap_or_default();
    match op {
        "connected" => Notice::Connected,
        "create" | "update" | "enter" => {
            let Some(object) = message.get("object") else {
                return Notice::Error(format!("{op} notification without object"));
            };
            if object.get("lastWriter").and_then(Value::as_str) == Some(user) {
                return Notice::Ignored;
            }
            match hangout_from_object(object) {
                Ok(hangout) => Notice::Hangout(hangout),
                Err(e) => Notice::Error(e.to_string()),
            }
        },
        "leave" => {
            tracing::debug!(%user, "ignoring live-query leave");
            Notice::Ignored
        },
        "error" => Notice::Error(
            message.get("error").and_then(Value::as_str).unwrap_or("live query error").to_string(),
        ),
        _ => Notice::Ignored,
    }
}

impl Transport for ServiceTransport {
    async fn connect(&mut self, identity: &Identity) -> Result<(), TransportError> {
        if let Some(task) = self.live_query.take() {
            task.abort();
        }
        self.identity = Some(identity.clone());
        self.state.set(ReadyState::Connecting);

        let profile = user_object(identity);
        if let Err(e) = self.write(USER_CLASS, &user_filter(&identity.username), &profile).await {
            self.state.set(ReadyState::Closed);
            return Err(TransportError::Connection(format!("registering user: {e}")));
        }
        tracing::info!(
            user = %identity.username,
            url = %self.config.live_query_url,
            "subscribing to live query"
        );

        let url = self.config.live_query_url.as_str();
        let (stream, _) = match tokio_tungstenite::connect_async(url).await {
            Ok(connected) => connected,
            Err(e) => {
                self.state.set(ReadyState::Closed);
                return Err(TransportError::Connection(e.to_string()));
            },
        };
        let (mut sink, mut source) = stream.split();

        let handshake = [
            json!({
                "op": "connect",
                "applicationId": self.config.application_id,
                "sessionToken": self.config.session_token,
            }),
            json!({
                "op": "subscribe",
                "requestId": 1,
                "query": { "className": HANGOUT_CLASS, "where": { "owner": identity.username } },
            }),
        ];
        for message in handshake {
            if let Err(e) = sink.send(Message::Text(message.to_string().into())).await {
                self.state.set(ReadyState::Closed);
                return Err(TransportError::Connection(e.to_string()));
            }
        }

        let user = identity.username.clone();
        let state = self.state.clone();
        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            // Holds the write half open for the life of the subscription.
            let _sink = sink;

            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = events.send(TransportEvent::Error(e.to_string())).await;
                        break;
                    },
                };

                let event = match serde_json::from_str::<Value>(text.as_str()) {
                    Ok(value) => match live_query_notice(&value, &user) {
                        Notice::Connected => {
                            state.set(ReadyState::Open);
                            TransportEvent::Open
                        },
                        Notice::Hangout(hangout) => {
                            TransportEvent::Frame(ServerFrame::Hangout { hangout })
                        },
                        Notice::Error(reason) => {
                            tracing::warn!(%user, %reason, "live query error");
                            TransportEvent::Error(reason)
                        },
                        Notice::Ignored => continue,
                    },
                    Err(e) => {
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

        self.live_query = Some(task.abort_handle());
        Ok(())
    }

    async fn send(&mut self, delivery: &Delivery) -> Result<(), TransportError> {
        let state = self.state.get();
        if !state.is_open() {
            return Err(TransportError::NotOpen(state));
        }
        let Some(identity) = &self.identity else {
            return Err(TransportError::NotOpen(state));
        };

        let me = identity.username.clone();
        let peer = delivery.peer();
        tracing::debug!(
            user = %me,
            %peer,
            command = %delivery.command,
            offline = delivery.offline,
            "writing hangout records"
        );

        let mut stored = delivery.sender.clone();
        if stored.email.is_empty() {
            stored.email = self.lookup_email(peer).await?.unwrap_or_default();
        }

        let own = hangout_object(&me, &me, &stored);
        self.write(HANGOUT_CLASS, &record_filter(&me, peer), &own).await?;
        let theirs = hangout_object(peer, &me, &delivery.target);
        self.write(HANGOUT_CLASS, &record_filter(peer, &me), &theirs).await?;

        stored.delivered = true;
        let frame = if delivery.offline {
            ServerFrame::OfflineAck { hangout: stored }
        } else {
            ServerFrame::Acknowledgement { hangout: stored }
        };
        self.events_tx.send(TransportEvent::Frame(frame)).await.map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Hangout>, TransportError> {
        let Some(identity) = &self.identity else {
            return Err(TransportError::NotOpen(self.state.get()));
        };

        let filter = search_filter(&identity.username, query);
        let body = self.query(HANGOUT_CLASS, &filter, self.config.search_limit).await?;
        body.get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(hangout_from_object).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn close(&mut self) {
        if let Some(task) = self.live_query.take() {
            self.state.set(ReadyState::Closing);
            task.abort();
            self.state.set(ReadyState::Closed);
            tracing::info!("live query closed");
            if self.events_tx.try_send(TransportEvent::Closed).is_err() {
                tracing::warn!("event channel full, close not reported");
            }
        }
    }
}

impl Drop for ServiceTransport {
    fn drop(&mut self) {
        if let Some(task) = self.live_query.take() {
            task.abort();
        }
    }
}
