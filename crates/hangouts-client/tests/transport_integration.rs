//! Socket transport against a local WebSocket server.

#![cfg(feature = "transport")]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hangouts_client::{
    Delivery, Identity, ReadyState,
    transport::{SocketConfig, SocketTransport, Transport, TransportError, TransportEvent},
};
use hangouts_proto::{Command, CommandFrame, Hangout, HangoutState, ServerFrame};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{Request, Response},
    },
};

async fn next_event(transport: &mut SocketTransport) -> TransportEvent {
    timeout(Duration::from_secs(5), transport.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport event channel closed")
}

fn invite(offline: bool) -> Delivery {
    Delivery {
        command: Command::Invite,
        sender: Hangout::new("bob", "bob@example.com", HangoutState::Invited, 10),
        target: Hangout::new("alice", "alice@example.com", HangoutState::Inviter, 10),
        offline,
    }
}

#[tokio::test]
async fn command_round_trip_with_acknowledgement() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = oneshot::channel();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        })
        .await
        .unwrap();

        let Some(Ok(Message::Text(text))) = ws.next().await else {
            panic!("expected a text frame");
        };
        let command = CommandFrame::decode(text.as_str()).unwrap();

        let (username, email) = (command.username.clone(), command.email.clone());
        let mut stored = Hangout::new(username, email, HangoutState::Invited, command.timestamp);
        stored.delivered = true;
        let ack = ServerFrame::Acknowledgement { hangout: stored }.encode().unwrap();
        ws.send(Message::Text(ack.into())).await.unwrap();
        command
    });

    let mut transport = SocketTransport::new(SocketConfig { url: format!("ws://{addr}") });
    transport.connect(&Identity::new("alice", "alice@example.com")).await.unwrap();

    assert_eq!(next_event(&mut transport).await, TransportEvent::Open);
    assert_eq!(transport.ready_state(), ReadyState::Open);
    assert_eq!(uri_rx.await.unwrap(), "/hangouts?username=alice&email=alice%40example.com");

    transport.send(&invite(false)).await.unwrap();

    let event = next_event(&mut transport).await;
    let TransportEvent::Frame(ServerFrame::Acknowledgement { hangout }) = event else {
        panic!("expected an acknowledgement");
    };
    assert_eq!(hangout.username, "bob");
    assert!(hangout.delivered);

    let received = server.await.unwrap();
    assert_eq!(received.command, Command::Invite);
    assert_eq!(received.username, "bob");
    assert_eq!(received.timestamp, 10);
    assert!(!received.offline);
}

#[tokio::test]
async fn undecodable_frame_is_reported_and_close_is_observed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text("{\"type\":\"NOPE\"}".into())).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let mut transport = SocketTransport::new(SocketConfig { url: format!("ws://{addr}") });
    transport.connect(&Identity::new("alice", "alice@example.com")).await.unwrap();

    assert_eq!(next_event(&mut transport).await, TransportEvent::Open);
    assert!(matches!(next_event(&mut transport).await, TransportEvent::Error(_)));
    assert_eq!(next_event(&mut transport).await, TransportEvent::Closed);
    assert_eq!(transport.ready_state(), ReadyState::Closed);

    let err = transport.send(&invite(true)).await.unwrap_err();
    assert!(matches!(err, TransportError::NotOpen(ReadyState::Closed)));
}

#[tokio::test]
async fn refused_connection_leaves_transport_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut transport = SocketTransport::new(SocketConfig { url: format!("ws://{addr}") });
    let err = transport.connect(&Identity::new("alice", "alice@example.com")).await.unwrap_err();

    assert!(matches!(err, TransportError::Connection(_)));
    assert_eq!(transport.ready_state(), ReadyState::Closed);
}
