//! Property-based tests over random multi-client histories.
//!
//! Random commands, focus changes and connection drops are applied to a
//! three-user world. The standard invariants are checked after every step.
//! Once everyone reconnects, nothing may remain queued or in flight and no
//! issued command may have been lost on the way.

use hangouts_client::IssueCommand;
use hangouts_core::Storage;
use hangouts_harness::{InvariantRegistry, SimInput, SimWorld};
use hangouts_proto::Command;
use proptest::prelude::*;

const USERS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Clone)]
enum Op {
    Command { user: usize, peer: usize, command: Command },
    Connect { user: usize },
    Disconnect { user: usize },
    Focus { user: usize, peer: usize },
    Leave { user: usize },
    Dismiss { user: usize, peer: usize },
}

fn user() -> impl Strategy<Value = usize> {
    0..USERS.len()
}

fn command() -> impl Strategy<Value = Command> {
    prop::sample::select(Command::ALL.to_vec())
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (user(), user(), command())
            .prop_map(|(user, peer, command)| Op::Command { user, peer, command }),
        2 => user().prop_map(|user| Op::Connect { user }),
        1 => user().prop_map(|user| Op::Disconnect { user }),
        2 => (user(), user()).prop_map(|(user, peer)| Op::Focus { user, peer }),
        1 => user().prop_map(|user| Op::Leave { user }),
        1 => (user(), user()).prop_map(|(user, peer)| Op::Dismiss { user, peer }),
    ]
}

fn apply(world: &mut SimWorld, op: &Op) {
    match *op {
        Op::Command { user, peer, command } => {
            let mut request = IssueCommand::new(command, USERS[peer]);
            if command == Command::Message {
                request = request.with_message("hi");
            }
            world.command(USERS[user], request);
        },
        Op::Connect { user } => world.connect(USERS[user]),
        Op::Disconnect { user } => world.disconnect(USERS[user]),
        Op::Focus { user, peer } => world.input(USERS[user], SimInput::Focus(USERS[peer].into())),
        Op::Leave { user } => world.input(USERS[user], SimInput::Leave),
        Op::Dismiss { user, peer } => {
            world.input(USERS[user], SimInput::Dismiss(USERS[peer].into()));
        },
    }
}

/// Every command a user's cache still shows as its own must have reached the
/// peer: delivered locally, with the matching record on the peer's side.
fn assert_own_commands_reached_peers(world: &SimWorld) {
    for user in USERS {
        let storage = world.storage(user).unwrap();
        for own in storage.hangouts(user).unwrap() {
            let states = own.state.command().states();
            if own.state != states.sender {
                continue;
            }
            let peer = own.username.as_str();
            assert!(own.delivered, "{user}'s {} to {peer} never acknowledged", own.state);

            let theirs = world.storage(peer).unwrap().hangout(peer, user).unwrap();
            assert_eq!(
                theirs.map(|h| (h.state, h.timestamp)),
                Some((states.target, own.timestamp)),
                "{user}'s {} never reached {peer}",
                own.state
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariants hold after every step. Once everyone reconnects, every
    /// offline queue and in-flight list is drained and every command still
    /// standing in a sender's cache has reached its peer.
    #[test]
    fn prop_world_converges(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

        rt.block_on(async {
            let mut world = SimWorld::new().with_invariants(InvariantRegistry::standard());
            for user in USERS {
                world.add_client(user);
            }

            for op in &ops {
                apply(&mut world, op);
                world.step().await.unwrap();
            }

            for user in USERS {
                world.connect(user);
            }
            world.settle().await.unwrap();

            for user in USERS {
                let storage = world.storage(user).unwrap();
                assert!(storage.offline_queue(user).unwrap().is_empty(), "{user} has queued items");
                assert!(storage.in_flight(user).unwrap().is_empty(), "{user} has items in flight");
            }
            assert_own_commands_reached_peers(&world);
        });
    }
}
