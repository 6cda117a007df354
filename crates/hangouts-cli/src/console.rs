//! Console driver.
//!
//! Implements [`Driver`] over stdin lines and one of the two transports.
//! Rendering writes the whole view to stdout whenever it changes.

use std::{
    collections::VecDeque,
    io::{self, Write},
    time::Duration,
};

use futures::FutureExt;
use hangouts_app::{App, AppAction, Driver};
use hangouts_client::{
    Delivery, Identity, IssueCommand, TransportEvent,
    transport::{ServiceTransport, SocketTransport, Transport, TransportError},
};
use hangouts_core::{Environment, ReadyState, SystemEnv};
use hangouts_proto::{Command, Hangout};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    commands::{self, HELP, Input, ParseError},
    view,
};

/// How long one input poll waits before the runtime ticks.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Console driver errors.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// I/O error writing to the console.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Rendering failed.
    #[error("render error: {0}")]
    Render(#[from] std::fmt::Error),
}

/// The transport selected at startup.
pub enum Backend {
    /// Custom WebSocket server.
    Socket(SocketTransport),
    /// Hosted backend.
    Service(ServiceTransport),
}

impl Transport for Backend {
    async fn connect(&mut self, identity: &Identity) -> Result<(), TransportError> {
        match self {
            Self::Socket(t) => t.connect(identity).await,
            Self::Service(t) => t.connect(identity).await,
        }
    }

    async fn send(&mut self, delivery: &Delivery) -> Result<(), TransportError> {
        match self {
            Self::Socket(t) => t.send(delivery).await,
            Self::Service(t) => t.send(delivery).await,
        }
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        match self {
            Self::Socket(t) => t.recv().await,
            Self::Service(t) => t.recv().await,
        }
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Hangout>, TransportError> {
        match self {
            Self::Socket(t) => t.search(query).await,
            Self::Service(t) => t.search(query).await,
        }
    }

    fn ready_state(&self) -> ReadyState {
        match self {
            Self::Socket(t) => t.ready_state(),
            Self::Service(t) => t.ready_state(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Socket(t) => t.close(),
            Self::Service(t) => t.close(),
        }
    }
}

/// Console driver implementing the [`Driver`] trait.
///
/// A background task forwards stdin lines over a channel. Transport events
/// that arrive while waiting for input are buffered until the runtime asks
/// for them.
pub struct ConsoleDriver<T: Transport> {
    transport: T,
    env: SystemEnv,
    lines: mpsc::Receiver<String>,
    events: VecDeque<TransportEvent>,
    last_frame: String,
}

impl<T: Transport> ConsoleDriver<T> {
    /// Create a driver reading commands from stdin.
    pub fn new(transport: T) -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
        Self::with_lines(transport, rx)
    }

    /// Create a driver reading commands from `lines`.
    pub fn with_lines(transport: T, lines: mpsc::Receiver<String>) -> Self {
        Self {
            transport,
            env: SystemEnv::new(),
            lines,
            events: VecDeque::new(),
            last_frame: String::new(),
        }
    }

    fn apply_line(&self, line: &str, app: &mut App) -> Vec<AppAction> {
        let online = self.transport.ready_state() == ReadyState::Open;

        match commands::parse(line) {
            Ok(Input::Connect) => app.connect(),
            Ok(Input::Command(command)) => app.issue_command(command.online(online)),
            Ok(Input::Say(text)) => match app.focused().map(str::to_string) {
                Some(peer) => app.issue_command(
                    IssueCommand::new(Command::Message, peer).with_message(text).online(online),
                ),
                None => {
                    app.set_status("Open a hangout first: /open <peer>");
                    vec![AppAction::Render]
                },
            },
            Ok(Input::Open(peer)) => app.focus_hangout(peer),
            Ok(Input::Leave) => app.leave_hangout(),
            Ok(Input::Dismiss(peer)) => app.dismiss_unread(peer),
            Ok(Input::Search(query)) => app.search(query),
            Ok(Input::Help) => {
                app.set_status(HELP);
                vec![AppAction::Render]
            },
            Ok(Input::Quit) => app.quit(),
            Err(ParseError::Empty) => vec![],
            Err(e) => {
                app.set_status(e.to_string());
                vec![AppAction::Render]
            },
        }
    }
}

impl<T: Transport> Driver for ConsoleDriver<T> {
    type Error = ConsoleError;

    async fn poll_input(&mut self, app: &mut App) -> Result<Vec<AppAction>, Self::Error> {
        if !self.events.is_empty() {
            return Ok(vec![]);
        }

        tokio::select! {
            biased;

            line = self.lines.recv() => match line {
                Some(line) => Ok(self.apply_line(&line, app)),
                None => {
                    tracing::info!("stdin closed");
                    Ok(app.quit())
                },
            },

            Some(event) = self.transport.recv() => {
                self.events.push_back(event);
                Ok(vec![])
            }

            () = self.env.sleep(POLL_INTERVAL) => Ok(vec![]),
        }
    }

    async fn connect(&mut self, identity: &Identity) -> Result<(), Self::Error> {
        Ok(self.transport.connect(identity).await?)
    }

    async fn send(&mut self, delivery: Delivery) -> Result<(), Self::Error> {
        Ok(self.transport.send(&delivery).await?)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        self.transport.recv().now_or_never().flatten()
    }

    async fn search(&mut self, query: &str) -> Result<Vec<Hangout>, Self::Error> {
        Ok(self.transport.search(query).await?)
    }

    fn now_millis(&self) -> u64 {
        self.env.now_millis()
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        let frame = view::render(app)?;
        if frame == self.last_frame {
            return Ok(());
        }

        let mut out = io::stdout().lock();
        writeln!(out, "{frame}")?;
        out.flush()?;
        self.last_frame = frame;
        Ok(())
    }

    fn stop(&mut self) {
        self.transport.close();
    }
}

impl<T: Transport> Drop for ConsoleDriver<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
