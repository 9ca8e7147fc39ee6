//! End-to-end scenarios: several full client stacks on one simulated relay.

use std::time::Duration;

use veilchat_client::{ClientConfig, Connectivity, ViewId};
use veilchat_core::ReconnectPolicy;
use veilchat_harness::{DriverLog, SimWorld};
use veilchat_proto::Identity;

fn views(log: &[DriverLog]) -> Vec<DriverLog> {
    log.iter().filter(|entry| !matches!(entry, DriverLog::Sent(_))).cloned().collect()
}

#[tokio::test]
async fn private_conversation_round_trip() {
    let mut world = SimWorld::new(1);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();

    world.line(alice, "/dm bob").await.unwrap();
    world.line(bob, "/dm alice").await.unwrap();
    world.line(alice, "hi bob").await.unwrap();
    world.line(bob, "hi alice").await.unwrap();

    let expected = vec!["alice: hi bob".to_string(), "bob: hi alice".to_string()];
    assert_eq!(world.driver(alice).transcript(), expected);
    assert_eq!(world.driver(bob).transcript(), expected);
    world.assert_invariants("after private exchange");
}

#[tokio::test]
async fn relay_only_stores_ciphertext() {
    let mut world = SimWorld::new(2);
    let alice = world.add_client("alice").await.unwrap();

    world.line(alice, "/dm bob").await.unwrap();
    world.line(alice, "attack at dawn").await.unwrap();

    let stored = world.relay().stored();
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].ciphertext, b"attack at dawn".to_vec());
    assert_eq!(world.driver(alice).transcript(), vec!["alice: attack at dawn".to_string()]);
}

#[tokio::test]
async fn switching_closes_before_opening() {
    let mut world = SimWorld::new(3);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();
    let carol = world.add_client("carol").await.unwrap();

    world.line(alice, "/dm bob").await.unwrap();
    world.line(alice, "/dm carol").await.unwrap();

    assert_eq!(views(&world.driver(alice).log()), vec![
        DriverLog::FetchedHistory(ViewId(1)),
        DriverLog::Opened(ViewId(1)),
        DriverLog::Closed(ViewId(1)),
        DriverLog::FetchedHistory(ViewId(2)),
        DriverLog::Opened(ViewId(2)),
    ]);
    assert!(world.relay().is_online(&Identity::new("alice")));

    world.line(bob, "/dm alice").await.unwrap();
    world.line(bob, "are you there?").await.unwrap();
    world.line(carol, "/dm alice").await.unwrap();
    world.line(carol, "hello from carol").await.unwrap();

    assert_eq!(world.driver(alice).transcript(), vec!["carol: hello from carol".to_string()]);
    world.assert_invariants("after switching to carol");
}

#[tokio::test]
async fn stalled_close_is_aborted_before_next_dial() {
    let mut world = SimWorld::new(4);
    let alice = world.add_client("alice").await.unwrap();

    world.line(alice, "/dm bob").await.unwrap();
    world.driver(alice).stall_closes(true);
    world.line(alice, "/dm carol").await.unwrap();

    assert_eq!(world.driver(alice).open_sessions(), 1);
    assert!(!world.driver(alice).log().contains(&DriverLog::Opened(ViewId(2))));

    world.advance(Duration::from_secs(6)).await.unwrap();

    assert_eq!(views(&world.driver(alice).log())[2..], [
        DriverLog::Closed(ViewId(1)),
        DriverLog::FetchedHistory(ViewId(2)),
        DriverLog::Aborted(ViewId(1)),
        DriverLog::Opened(ViewId(2)),
    ]);
    assert_eq!(world.app(alice).connectivity(), Connectivity::Online);
    world.assert_invariants("after close timeout");
}

#[tokio::test]
async fn room_members_share_messages_and_key() {
    let mut world = SimWorld::new(5);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();
    let carol = world.add_client("carol").await.unwrap();

    for client in [alice, bob, carol] {
        world.line(client, "/room 7").await.unwrap();
    }
    world.line(bob, "hello room").await.unwrap();

    for client in [alice, bob, carol] {
        assert_eq!(world.driver(client).transcript(), vec!["bob: hello room".to_string()]);
    }

    let fingerprint = |client| world.driver(client).snapshot().unwrap().key_fingerprint;
    assert!(fingerprint(alice).is_some());
    assert_eq!(fingerprint(alice), fingerprint(bob));
    assert_eq!(fingerprint(bob), fingerprint(carol));
    world.assert_invariants("after room broadcast");
}

#[tokio::test]
async fn room_message_does_not_leak_into_private_view() {
    let mut world = SimWorld::new(6);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();

    world.line(alice, "/dm bob").await.unwrap();
    world.line(bob, "/room 1").await.unwrap();
    world.line(bob, "room chatter").await.unwrap();

    assert!(world.driver(alice).transcript().is_empty());
    world.assert_invariants("after room chatter");
}

#[tokio::test]
async fn typing_shown_to_others_then_expires() {
    let mut world = SimWorld::new(7);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();
    world.line(alice, "/room 9").await.unwrap();
    world.line(bob, "/room 9").await.unwrap();

    world.line(alice, "/typing").await.unwrap();

    let typing = |world: &SimWorld, client| world.app(client).conversation().unwrap().typing.clone();
    assert_eq!(typing(&world, bob), vec![Identity::new("alice")]);
    assert!(typing(&world, alice).is_empty());

    world.advance(Duration::from_secs(3)).await.unwrap();

    assert!(typing(&world, bob).is_empty());
    world.assert_invariants("after typing expired");
}

#[tokio::test]
async fn sending_stops_typing() {
    let mut world = SimWorld::new(8);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();
    world.line(alice, "/room 9").await.unwrap();
    world.line(bob, "/room 9").await.unwrap();

    world.line(alice, "/typing").await.unwrap();
    world.line(alice, "done typing").await.unwrap();

    assert!(world.app(bob).conversation().unwrap().typing.is_empty());
    assert_eq!(world.driver(bob).transcript(), vec!["alice: done typing".to_string()]);
}

#[tokio::test]
async fn stale_history_is_dropped() {
    let mut world = SimWorld::new(9);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();
    let carol = world.add_client("carol").await.unwrap();

    world.line(bob, "/dm alice").await.unwrap();
    world.line(bob, "old dm").await.unwrap();
    world.line(carol, "/room 3").await.unwrap();
    world.line(carol, "room history").await.unwrap();

    world.driver(alice).hold_history(true);
    world.line(alice, "/dm bob").await.unwrap();
    world.line(alice, "/room 3").await.unwrap();
    world.driver(alice).release_history();
    world.settle().await.unwrap();

    assert_eq!(world.driver(alice).transcript(), vec!["carol: room history".to_string()]);
    world.assert_invariants("after late history");
}

#[tokio::test]
async fn history_failure_is_reported() {
    let mut world = SimWorld::new(10);
    let alice = world.add_client("alice").await.unwrap();
    world.relay().set_history_unavailable(true);

    world.line(alice, "/room 2").await.unwrap();

    let conversation = world.app(alice).conversation().unwrap();
    assert_eq!(conversation.history_error.as_deref(), Some("503 Service Unavailable"));
    assert_eq!(world.app(alice).connectivity(), Connectivity::Online);
}

#[tokio::test]
async fn reconnect_recovers_missed_messages() {
    let mut world = SimWorld::new(11);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();
    world.line(alice, "/dm bob").await.unwrap();
    world.line(bob, "/dm alice").await.unwrap();
    world.line(bob, "before").await.unwrap();

    world.driver(alice).drop_connections();
    world.settle().await.unwrap();
    assert_eq!(world.app(alice).connectivity(), Connectivity::Reconnecting { attempt: 1 });

    world.line(bob, "while you were away").await.unwrap();
    world.advance(Duration::from_secs(1)).await.unwrap();

    assert_eq!(world.app(alice).connectivity(), Connectivity::Online);
    assert_eq!(world.driver(alice).transcript(), vec![
        "bob: before".to_string(),
        "bob: while you were away".to_string(),
    ]);
    world.assert_invariants("after reconnect");
}

#[tokio::test]
async fn reconnect_gives_up_after_policy_attempts() {
    let mut world = SimWorld::new(12);
    let config = ClientConfig {
        reconnect: ReconnectPolicy { max_attempts: 2, ..ReconnectPolicy::default() },
        ..ClientConfig::default()
    };
    let alice = world.add_client_with("alice", config).await.unwrap();
    world.line(alice, "/room 1").await.unwrap();

    world.relay().set_refuse_connections(true);
    world.driver(alice).drop_connections();
    world.settle().await.unwrap();
    for _ in 0..4 {
        world.advance(Duration::from_secs(60)).await.unwrap();
    }

    let refused = world.driver(alice).log().iter().filter(|e| matches!(e, DriverLog::Refused(_))).count();
    assert_eq!(refused, 2);
    assert_eq!(world.app(alice).connectivity(), Connectivity::Lost);

    world.line(alice, "anyone?").await.unwrap();
    assert_eq!(world.driver(alice).status().as_deref(), Some("Not connected; message not sent"));
}

#[tokio::test]
async fn roster_tracks_connections() {
    let mut world = SimWorld::new(13);
    let alice = world.add_client("alice").await.unwrap();
    let bob = world.add_client("bob").await.unwrap();

    world.line(alice, "/room 1").await.unwrap();
    world.line(bob, "/room 1").await.unwrap();
    world.line(alice, "/who").await.unwrap();
    assert_eq!(world.driver(alice).status().as_deref(), Some("Online: alice, bob"));

    world.line(bob, "/quit").await.unwrap();
    world.line(alice, "/who").await.unwrap();

    assert!(world.finished(bob));
    assert_eq!(world.driver(alice).status().as_deref(), Some("Online: alice"));
}

#[tokio::test]
async fn quit_closes_gracefully() {
    let mut world = SimWorld::new(14);
    let alice = world.add_client("alice").await.unwrap();
    world.line(alice, "/room 1").await.unwrap();

    world.line(alice, "/quit").await.unwrap();

    assert!(world.finished(alice));
    let log = views(&world.driver(alice).log());
    assert_eq!(log.last(), Some(&DriverLog::Closed(ViewId(1))));
    assert!(!log.contains(&DriverLog::Aborted(ViewId(1))));
}

#[tokio::test]
async fn quit_waits_out_stalled_close() {
    let mut world = SimWorld::new(15);
    let alice = world.add_client("alice").await.unwrap();
    world.line(alice, "/room 1").await.unwrap();
    world.driver(alice).stall_closes(true);

    world.line(alice, "/quit").await.unwrap();

    assert!(world.finished(alice));
    assert!(views(&world.driver(alice).log()).ends_with(&[
        DriverLog::Closed(ViewId(1)),
        DriverLog::Aborted(ViewId(1)),
    ]));
}

#[tokio::test]
async fn same_seed_same_run() {
    async fn run(seed: u64) -> Vec<DriverLog> {
        let mut world = SimWorld::new(seed);
        let alice = world.add_client("alice").await.unwrap();
        world.line(alice, "/dm bob").await.unwrap();
        world.driver(alice).drop_connections();
        world.settle().await.unwrap();
        world.advance(Duration::from_millis(450)).await.unwrap();
        world.advance(Duration::from_millis(200)).await.unwrap();
        world.driver(alice).log()
    }

    assert_eq!(run(99).await, run(99).await);
}
