//! End-to-end scenarios over the simulated relay.
//!
//! Every client is a real `Runtime` with an in-memory cache. Each test
//! enables the standard invariants, which are checked after every step.

use std::time::Duration;

use hangouts_client::{EngineConfig, IssueCommand};
use hangouts_core::{ReadyState, Storage};
use hangouts_harness::{InvariantRegistry, SimInput, SimWorld};
use hangouts_proto::{Command, Hangout, HangoutState, MessageKind};

fn world(users: &[&str]) -> SimWorld {
    let mut world = SimWorld::new().with_invariants(InvariantRegistry::standard());
    for user in users {
        world.add_client(user);
    }
    world
}

async fn online(users: &[&str]) -> SimWorld {
    let mut world = world(users);
    for user in users {
        world.connect(user);
    }
    world.settle().await.unwrap();
    world
}

#[tokio::test]
async fn invite_between_online_users() {
    let mut world = online(&["alice", "bob"]).await;

    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.settle().await.unwrap();

    let alice = world.storage("alice").unwrap().hangout("alice", "bob").unwrap().unwrap();
    assert_eq!(alice.state, HangoutState::Invited);
    assert!(alice.delivered);

    let bob = world.storage("bob").unwrap().hangout("bob", "alice").unwrap().unwrap();
    assert_eq!(bob.state, HangoutState::Inviter);
    assert!(!bob.read);

    let app = world.app("bob").unwrap();
    assert_eq!(app.unread().len(), 1);
    assert_eq!(app.route().map(|r| r.screen()), Some("invitee"));
    assert!(world.app("alice").unwrap().pending().is_none());
}

#[tokio::test]
async fn invited_peer_view_snapshot() {
    let mut world = online(&["alice", "bob"]).await;

    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.settle().await.unwrap();

    let snapshot = world.snapshot().unwrap();
    insta::assert_json_snapshot!(snapshot.client("bob"), {
        ".hangouts[].timestamp" => "[timestamp]",
        ".unread[].timestamp" => "[timestamp]",
    }, @r#"
    {
      "user": "bob",
      "ready_state": "OPEN",
      "focused": null,
      "hangouts": [
        {
          "username": "alice",
          "email": "alice@example.com",
          "message": null,
          "state": "INVITER",
          "timestamp": "[timestamp]",
          "delivered": false,
          "read": false
        }
      ],
      "unread": [
        {
          "username": "alice",
          "email": "alice@example.com",
          "message": null,
          "state": "INVITER",
          "timestamp": "[timestamp]",
          "delivered": false,
          "read": false
        }
      ],
      "offline": [],
      "in_flight": []
    }
    "#);
}

#[tokio::test]
async fn accepted_invite_opens_chat() {
    let mut world = online(&["alice", "bob"]).await;

    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.settle().await.unwrap();
    world.input("bob", SimInput::Focus("alice".into()));
    world.command("bob", IssueCommand::new(Command::Accept, "alice"));
    world.settle().await.unwrap();

    world.command("alice", IssueCommand::new(Command::Message, "bob").with_message("hello"));
    world.settle().await.unwrap();

    let bob = world.app("bob").unwrap();
    let messages = bob.messages("alice");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hello");
    assert_eq!(messages[0].username, "alice");
    assert!(messages[0].read);
    assert!(bob.unread().is_empty());

    let alice = world.app("alice").unwrap();
    assert_eq!(alice.messages("bob").len(), 1);
    assert_eq!(alice.hangout("bob").map(|h| h.state), Some(HangoutState::Messaged));
}

#[tokio::test]
async fn message_to_blocker_is_not_sent() {
    let mut world = online(&["alice", "bob"]).await;

    world.command("bob", IssueCommand::new(Command::Block, "alice"));
    world.settle().await.unwrap();
    let relayed = world.relay().relayed();

    world.command("alice", IssueCommand::new(Command::Message, "bob").with_message("hi?"));
    world.settle().await.unwrap();

    assert_eq!(world.relay().relayed(), relayed);
    let alice = world.app("alice").unwrap();
    assert_eq!(alice.hangout("bob").map(|h| h.state), Some(HangoutState::Blocker));
    let messages = alice.messages("bob");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, Some(MessageKind::Blocker));
    assert!(world.app("bob").unwrap().messages("alice").is_empty());
}

#[tokio::test]
async fn offline_block_replays_and_reaches_peer_later() {
    let mut world = world(&["alice", "bob"]);

    world.command("alice", IssueCommand::new(Command::Block, "bob"));
    world.settle().await.unwrap();
    let storage = world.storage("alice").unwrap();
    assert_eq!(storage.offline_queue("alice").unwrap().len(), 1);
    assert_eq!(world.app("alice").unwrap().queued(), 1);

    world.connect("alice");
    world.settle().await.unwrap();

    let storage = world.storage("alice").unwrap();
    assert!(storage.offline_queue("alice").unwrap().is_empty());
    assert!(storage.in_flight("alice").unwrap().is_empty());
    assert_eq!(world.app("alice").unwrap().queued(), 0);
    assert_eq!(world.relay().mailbox("bob").len(), 1);

    world.connect("bob");
    world.settle().await.unwrap();

    let bob = world.app("bob").unwrap();
    assert_eq!(bob.hangout("alice").map(|h| h.state), Some(HangoutState::Blocker));
    assert_eq!(bob.unread().len(), 1);
    assert!(bob.route().is_none());
}

#[tokio::test]
async fn unacknowledged_replay_is_requeued_on_disconnect() {
    let mut world = world(&["alice"]);
    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.settle().await.unwrap();

    world.lose_traffic("alice", true);
    world.connect("alice");
    world.settle().await.unwrap();

    let storage = world.storage("alice").unwrap();
    assert!(storage.offline_queue("alice").unwrap().is_empty());
    assert_eq!(storage.in_flight("alice").unwrap().len(), 1);
    assert_eq!(world.app("alice").unwrap().queued(), 0);

    world.disconnect("alice");
    world.settle().await.unwrap();

    let storage = world.storage("alice").unwrap();
    assert_eq!(storage.offline_queue("alice").unwrap().len(), 1);
    assert!(storage.in_flight("alice").unwrap().is_empty());
    let app = world.app("alice").unwrap();
    assert_eq!(app.ready_state(), ReadyState::Closed);
    assert_eq!(app.queued(), 1);

    world.lose_traffic("alice", false);
    world.connect("alice");
    world.settle().await.unwrap();

    let storage = world.storage("alice").unwrap();
    assert!(storage.offline_queue("alice").unwrap().is_empty());
    assert!(storage.in_flight("alice").unwrap().is_empty());
    assert_eq!(world.relay().mailbox("bob").len(), 1);
}

#[tokio::test]
async fn refused_connection_keeps_queueing() {
    let mut world = world(&["alice"]);
    world.handle("alice").unwrap().refuse_connect(true);

    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.connect("alice");
    world.settle().await.unwrap();

    let app = world.app("alice").unwrap();
    assert_eq!(app.ready_state(), ReadyState::Closed);
    assert!(app.error().is_some());
    assert_eq!(world.storage("alice").unwrap().offline_queue("alice").unwrap().len(), 1);
}

#[tokio::test]
async fn command_refused_by_closed_transport_is_replayed() {
    let mut world = online(&["alice", "bob"]).await;

    // The engine still believes the transport is open when the command runs.
    world.disconnect("alice");
    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.settle().await.unwrap();

    let app = world.app("alice").unwrap();
    assert!(app.pending().is_none());
    assert_eq!(app.queued(), 1);
    assert_eq!(world.storage("alice").unwrap().offline_queue("alice").unwrap().len(), 1);

    world.connect("alice");
    world.settle().await.unwrap();

    let bob = world.storage("bob").unwrap().hangout("bob", "alice").unwrap();
    assert_eq!(bob.map(|h| h.state), Some(HangoutState::Inviter));
    let alice = world.storage("alice").unwrap();
    assert!(alice.offline_queue("alice").unwrap().is_empty());
    assert!(alice.in_flight("alice").unwrap().is_empty());
    assert!(alice.hangout("alice", "bob").unwrap().is_some_and(|h| h.delivered));
}

#[tokio::test]
async fn unacknowledged_command_times_out() {
    let mut world = SimWorld::new().with_invariants(InvariantRegistry::standard());
    world.add_client_with("alice", EngineConfig {
        ack_timeout: Some(Duration::from_millis(50)),
        ..EngineConfig::default()
    });
    world.connect("alice");
    world.settle().await.unwrap();

    world.lose_traffic("alice", true);
    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.settle().await.unwrap();
    assert!(world.app("alice").unwrap().pending().is_some());

    world.env().advance(Duration::from_millis(100));
    world.step().await.unwrap();

    let app = world.app("alice").unwrap();
    assert!(app.pending().is_none());
    assert_eq!(app.error(), Some("No acknowledgement from bob"));
}

#[tokio::test]
async fn search_falls_back_to_cache() {
    let mut world = online(&["alice"]).await;
    world.command("alice", IssueCommand::new(Command::Invite, "bobby"));
    world.command("alice", IssueCommand::new(Command::Invite, "carol"));
    world.settle().await.unwrap();

    world.input("alice", SimInput::Search("BOB".into()));
    world.settle().await.unwrap();
    let names: Vec<_> =
        world.app("alice").unwrap().search_results().iter().map(|h| h.username.clone()).collect();
    assert_eq!(names, vec!["bobby"]);

    world
        .handle("alice")
        .unwrap()
        .set_remote_search(Some(vec![Hangout::new("bobcat", "", HangoutState::Inviter, 1)]));
    world.input("alice", SimInput::Search("bob".into()));
    world.settle().await.unwrap();
    let names: Vec<_> =
        world.app("alice").unwrap().search_results().iter().map(|h| h.username.clone()).collect();
    assert_eq!(names, vec!["bobcat"]);
}

#[tokio::test]
async fn quit_stops_the_client() {
    let mut world = online(&["alice"]).await;

    world.input("alice", SimInput::Quit);
    world.command("alice", IssueCommand::new(Command::Invite, "bob"));
    world.settle().await.unwrap();

    assert!(world.app("alice").unwrap().hangouts().is_empty());
}
