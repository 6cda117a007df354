//! Property tests for staged cache edits.
//!
//! Random edit sequences are applied through [`CacheTxn`] to both storage
//! backends. Both must end in the same state, and list invariants (one
//! hangout per peer, one unread entry per peer) must hold throughout.

use hangouts_core::{CacheTxn, MemoryStorage, RedbStorage, Storage};
use hangouts_proto::{Hangout, HangoutState, Message, MessageBody};
use proptest::prelude::*;

const USER: &str = "alice";

#[derive(Debug, Clone)]
enum Edit {
    Upsert { peer: usize, state: HangoutState },
    AddUnread { peer: usize },
    RemoveUnread { peer: usize },
    Message { peer: usize, timestamp: u64 },
    Enqueue { peer: usize, state: HangoutState },
    Flush,
    Requeue,
    Resolve { peer: usize, state: HangoutState },
}

const PEERS: [&str; 4] = ["bob", "carol", "dave", "erin"];

fn edit() -> impl Strategy<Value = Edit> {
    let peer = 0..PEERS.len();
    let state = prop::sample::select(HangoutState::ALL.to_vec());
    prop_oneof![
        (peer.clone(), state.clone()).prop_map(|(peer, state)| Edit::Upsert { peer, state }),
        peer.clone().prop_map(|peer| Edit::AddUnread { peer }),
        peer.clone().prop_map(|peer| Edit::RemoveUnread { peer }),
        (peer.clone(), 0u64..8).prop_map(|(peer, timestamp)| Edit::Message { peer, timestamp }),
        (peer.clone(), state.clone()).prop_map(|(peer, state)| Edit::Enqueue { peer, state }),
        Just(Edit::Flush),
        Just(Edit::Requeue),
        (peer, state).prop_map(|(peer, state)| Edit::Resolve { peer, state }),
    ]
}

fn apply<S: Storage>(storage: &S, edits: &[Edit]) {
    let mut txn = CacheTxn::new(storage, USER);
    for edit in edits {
        match edit {
            Edit::Upsert { peer, state } => {
                txn.upsert_hangout(Hangout::new(PEERS[*peer], "", *state, 1)).unwrap();
            },
            Edit::AddUnread { peer } => {
                txn.add_unread(Hangout::new(PEERS[*peer], "", HangoutState::Inviter, 1)).unwrap();
            },
            Edit::RemoveUnread { peer } => {
                txn.remove_unread(PEERS[*peer]).unwrap();
            },
            Edit::Message { peer, timestamp } => {
                let body = MessageBody { text: format!("t{timestamp}"), timestamp: *timestamp };
                txn.merge_message(PEERS[*peer], Message::from_body(&body, USER)).unwrap();
            },
            Edit::Enqueue { peer, state } => {
                txn.enqueue_offline(Hangout::new(PEERS[*peer], "", *state, 1)).unwrap();
            },
            Edit::Flush => {
                txn.take_offline().unwrap();
            },
            Edit::Requeue => {
                txn.requeue_in_flight().unwrap();
            },
            Edit::Resolve { peer, state } => {
                txn.resolve_in_flight(PEERS[*peer], *state).unwrap();
            },
        }
    }
    txn.commit().unwrap();
}

fn unique(names: impl Iterator<Item = String>) -> bool {
    let mut names: Vec<_> = names.collect();
    let before = names.len();
    names.sort();
    names.dedup();
    names.len() == before
}

fn edit_batches() -> impl Strategy<Value = Vec<Vec<Edit>>> {
    prop::collection::vec(prop::collection::vec(edit(), 0..12), 1..6)
}

fn queued_states() -> impl Strategy<Value = Vec<HangoutState>> {
    prop::collection::vec(prop::sample::select(HangoutState::ALL.to_vec()), 0..10)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_backends_agree(batches in edit_batches()) {
        let dir = tempfile::tempdir().unwrap();
        let redb = RedbStorage::open(dir.path().join("cache.redb")).unwrap();
        let memory = MemoryStorage::new();

        for batch in &batches {
            apply(&memory, batch);
            apply(&redb, batch);
        }

        prop_assert_eq!(memory.hangouts(USER).unwrap(), redb.hangouts(USER).unwrap());
        prop_assert_eq!(memory.list_unread(USER).unwrap(), redb.list_unread(USER).unwrap());
        prop_assert_eq!(memory.offline_queue(USER).unwrap(), redb.offline_queue(USER).unwrap());
        prop_assert_eq!(memory.in_flight(USER).unwrap(), redb.in_flight(USER).unwrap());
        for peer in PEERS {
            let (left, right) = (memory.messages(USER, peer), redb.messages(USER, peer));
            prop_assert_eq!(left.unwrap(), right.unwrap());
        }
    }

    #[test]
    fn prop_lists_stay_keyed(batches in edit_batches()) {
        let storage = MemoryStorage::new();

        for batch in &batches {
            apply(&storage, batch);

            let hangouts = storage.hangouts(USER).unwrap();
            prop_assert!(unique(hangouts.into_iter().map(|h| h.username)));

            let unread = storage.list_unread(USER).unwrap();
            prop_assert!(unique(unread.into_iter().map(|h| h.username)));

            for peer in PEERS {
                let messages = storage.messages(USER, peer).unwrap();
                prop_assert!(unique(messages.into_iter().map(|m| m.timestamp.to_string())));
            }
        }
    }

    #[test]
    fn prop_flush_conserves_items(states in queued_states()) {
        let storage = MemoryStorage::new();
        let edits: Vec<_> = states
            .iter()
            .enumerate()
            .map(|(i, state)| Edit::Enqueue { peer: i % PEERS.len(), state: *state })
            .collect();
        apply(&storage, &edits);

        apply(&storage, &[Edit::Flush]);
        prop_assert!(storage.offline_queue(USER).unwrap().is_empty());
        prop_assert_eq!(storage.in_flight(USER).unwrap().len(), states.len());

        apply(&storage, &[Edit::Requeue]);
        prop_assert!(storage.in_flight(USER).unwrap().is_empty());
        let requeued: Vec<_> =
            storage.offline_queue(USER).unwrap().into_iter().map(|h| h.state).collect();
        prop_assert_eq!(requeued, states);
    }
}
