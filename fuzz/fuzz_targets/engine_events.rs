//! Fuzz target for the engine under storage failures
//!
//! Drives one engine with arbitrary commands, frames, focus changes,
//! readiness changes and ticks while ChaoticStorage injects write failures.
//!
//! # Invariants
//!
//! - The engine NEVER panics, whatever the event order
//! - Storage errors propagate as Result::Err
//! - At most one cached hangout per peer
//! - A peer is on the unread list only if its cached record is unread

#![no_main]

use std::{future::Future, time::Duration};

use arbitrary::Arbitrary;
use hangouts_client::{Engine, EngineConfig, EngineEvent, Identity, IssueCommand, TransitionPolicy};
use hangouts_core::{ChaoticStorage, Environment, MemoryStorage, ReadyState, Storage};
use hangouts_proto::{Command, Hangout, HangoutState, MessageBody, ServerFrame};
use libfuzzer_sys::fuzz_target;

const PEERS: [&str; 3] = ["bob", "carol", "dave"];

#[derive(Debug, Clone, Copy, Default)]
struct FixedEnv;

impl Environment for FixedEnv {
    fn now_millis(&self) -> u64 {
        1_700_000_000_000
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    chaos_seed: u64,
    /// 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    permissive: bool,
    events: Vec<FuzzEvent>,
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    Issue { command: u8, peer: u8, online: bool, text: Option<String> },
    Frame { kind: u8, peer: u8, state: u8, timestamp: u16, read: bool, text: Option<String> },
    Unread { peers: Vec<(u8, u8)> },
    Focus { peer: u8 },
    Leave,
    Dismiss { peer: u8 },
    Ready { state: u8 },
    TransportError,
    Tick { advance: u16 },
    Restore,
}

fn peer(index: u8) -> &'static str {
    PEERS[index as usize % PEERS.len()]
}

fn state(index: u8) -> HangoutState {
    HangoutState::ALL[index as usize % HangoutState::ALL.len()]
}

fn record(peer_index: u8, state_index: u8, timestamp: u64, text: Option<String>) -> Hangout {
    let body = text.map(|text| MessageBody { text, timestamp });
    Hangout::new(peer(peer_index), "", state(state_index), timestamp).with_message(body)
}

fn to_event(event: FuzzEvent, now: &mut u64) -> EngineEvent {
    match event {
        FuzzEvent::Issue { command, peer: p, online, text } => {
            let command = Command::ALL[command as usize % Command::ALL.len()];
            let mut request = IssueCommand::new(command, peer(p)).online(online);
            if let Some(text) = text {
                request = request.with_message(text);
            }
            EngineEvent::IssueCommand(request)
        },
        FuzzEvent::Frame { kind, peer: p, state: s, timestamp, read, text } => {
            let mut hangout = record(p, s, u64::from(timestamp), text);
            hangout.read = read;
            EngineEvent::FrameReceived(match kind % 4 {
                0 => ServerFrame::Acknowledgement { hangout },
                1 => ServerFrame::OfflineAck { hangout },
                2 => ServerFrame::Hangout { hangout },
                _ => ServerFrame::Error { message: "fuzz".into() },
            })
        },
        FuzzEvent::Unread { peers } => EngineEvent::FrameReceived(ServerFrame::UnreadHangouts {
            hangouts: peers.into_iter().take(8).map(|(p, s)| record(p, s, *now, None)).collect(),
        }),
        FuzzEvent::Focus { peer: p } => EngineEvent::FocusHangout { peer: peer(p).into() },
        FuzzEvent::Leave => EngineEvent::LeaveHangout,
        FuzzEvent::Dismiss { peer: p } => EngineEvent::DismissUnread { peer: peer(p).into() },
        FuzzEvent::Ready { state } => EngineEvent::ConnectionChanged(match state % 4 {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }),
        FuzzEvent::TransportError => EngineEvent::TransportError { reason: "fuzz".into() },
        FuzzEvent::Tick { advance } => {
            *now = now.saturating_add(u64::from(advance));
            EngineEvent::Tick { now: *now }
        },
        FuzzEvent::Restore => EngineEvent::Restore,
    }
}

fuzz_target!(|scenario: Scenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let storage =
        ChaoticStorage::with_seed(MemoryStorage::new(), failure_rate, scenario.chaos_seed);
    let config = EngineConfig {
        policy: if scenario.permissive {
            TransitionPolicy::Permissive
        } else {
            TransitionPolicy::Strict
        },
        ack_timeout: Some(Duration::from_millis(500)),
    };
    let identity = Identity::new("alice", "alice@example.com");
    let mut engine = Engine::new(FixedEnv, storage, identity, config);
    let mut now = FixedEnv.now_millis();

    for event in scenario.events {
        // Errors are expected under injected failures; panics are not.
        let _ = engine.handle(to_event(event, &mut now));
    }

    let storage = engine.storage().inner();
    let hangouts = storage.hangouts("alice").expect("memory storage reads");
    let unread = storage.list_unread("alice").expect("memory storage reads");

    for (i, hangout) in hangouts.iter().enumerate() {
        assert!(
            hangouts[i + 1..].iter().all(|other| other.username != hangout.username),
            "duplicate hangout for {}",
            hangout.username
        );
    }
    for entry in &unread {
        if let Some(cached) = hangouts.iter().find(|h| h.username == entry.username) {
            assert!(
                !cached.read || failure_rate > 0.0,
                "{} is unread but cached as read",
                entry.username
            );
        }
    }
});
