//! Election scenarios over the in-process bus

use quote_cluster::{
    ClusterConfig, ElectionEngine, ElectionMessage, ElectionOutcome, LocalBus, MessageType,
    NodeIdentity, NodePhase,
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Instant};
use tracing_subscriber::fmt::try_init;

fn members(nodes: &[(&str, i64)]) -> Vec<String> {
    nodes.iter().map(|(id, _)| id.to_string()).collect()
}

fn spawn_node(bus: &LocalBus, id: &str, birth_time: i64, peers: &[&str]) -> ElectionEngine {
    let config = ClusterConfig::new(id, peers.iter().map(|p| p.to_string()).collect());
    let engine = ElectionEngine::on_bus(NodeIdentity::with_birth_time(id, birth_time), &config, bus);
    bus.join(&engine);
    engine
}

fn spawn_cluster(bus: &LocalBus, nodes: &[(&str, i64)]) -> Vec<ElectionEngine> {
    let all = members(nodes);
    let all: Vec<&str> = all.iter().map(String::as_str).collect();
    nodes
        .iter()
        .map(|(id, birth_time)| spawn_node(bus, id, *birth_time, &all))
        .collect()
}

fn drain(inbox: &mut UnboundedReceiver<ElectionMessage>) -> Vec<ElectionMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = inbox.try_recv() {
        messages.push(message);
    }
    messages
}

/// Three nodes starting together agree on the oldest one
#[tokio::test(start_paused = true)]
async fn test_cluster_converges_on_oldest_node() {
    let _ = try_init();

    let bus = LocalBus::new();
    let nodes = spawn_cluster(&bus, &[("a", 100), ("b", 200), ("c", 300)]);
    for node in &nodes {
        node.start();
    }

    sleep(Duration::from_secs(10)).await;

    assert!(nodes[0].is_leader().await);
    for node in &nodes {
        assert_eq!(node.current_leader_id().await.as_deref(), Some("a"));
        assert!(node.check_invariants().await.is_ok());
    }
    assert_eq!(nodes[1].phase().await, NodePhase::Follower);
    assert_eq!(nodes[2].phase().await, NodePhase::Follower);
}

/// A node joining a settled cluster adopts the leader without an election
#[tokio::test(start_paused = true)]
async fn test_late_joiner_discovers_leader() {
    let _ = try_init();

    let bus = LocalBus::new();
    let nodes = spawn_cluster(&bus, &[("a", 100), ("b", 200)]);
    for node in &nodes {
        node.start();
    }
    sleep(Duration::from_secs(10)).await;

    let late = spawn_node(&bus, "c", 400, &["a", "b"]);
    late.start();
    sleep(Duration::from_secs(2)).await;

    assert_eq!(late.phase().await, NodePhase::Follower);
    assert_eq!(late.current_leader_id().await.as_deref(), Some("a"));
    assert!(nodes[0].is_leader().await);
}

/// Losing the leader makes the next oldest survivor take over
#[tokio::test(start_paused = true)]
async fn test_leader_crash_triggers_reelection() {
    let _ = try_init();

    let bus = LocalBus::new();
    let nodes = spawn_cluster(&bus, &[("a", 100), ("b", 200), ("c", 300)]);
    for node in &nodes {
        node.start();
    }
    sleep(Duration::from_secs(10)).await;
    assert!(nodes[0].is_leader().await);

    bus.crash("a");
    nodes[0].shutdown();

    let outcome = nodes[1].ping_leader().await;
    assert_eq!(outcome, Some(ElectionOutcome::BecameLeader));
    sleep(Duration::from_secs(1)).await;

    assert!(nodes[1].is_leader().await);
    assert_eq!(nodes[2].current_leader_id().await.as_deref(), Some("b"));
    assert!(!nodes[2].is_leader().await);
}

/// The youngest survivor noticing the crash defers to an older one
#[tokio::test(start_paused = true)]
async fn test_youngest_survivor_defers_after_crash() {
    let _ = try_init();

    let bus = LocalBus::new();
    let nodes = spawn_cluster(&bus, &[("a", 100), ("b", 200), ("c", 300)]);
    for node in &nodes {
        node.start();
    }
    sleep(Duration::from_secs(10)).await;

    bus.crash("a");
    nodes[0].shutdown();

    let outcome = nodes[2].ping_leader().await;
    assert_eq!(outcome, Some(ElectionOutcome::Deferred));

    sleep(Duration::from_secs(5)).await;
    assert!(nodes[1].is_leader().await);
    assert_eq!(nodes[2].phase().await, NodePhase::Follower);
    assert_eq!(nodes[2].current_leader_id().await.as_deref(), Some("b"));
}

/// An OK arriving after the deadline changes nothing
#[tokio::test(start_paused = true)]
async fn test_late_ok_is_ignored() {
    let _ = try_init();

    let bus = LocalBus::new();
    let mut peer_inbox = bus.register_mailbox("b");
    let peer = NodeIdentity::with_birth_time("b", 100);
    let node = spawn_node(&bus, "a", 300, &["b"]);

    let runner = tokio::spawn({
        let node = node.clone();
        async move { node.start_election().await }
    });

    let election = peer_inbox.recv().await.unwrap();
    assert_eq!(election.message_type, MessageType::Election);
    assert_eq!(runner.await.unwrap(), ElectionOutcome::BecameLeader);

    assert!(!node.on_ok(&election.election_id));
    bus.deliver("a", ElectionMessage::ok(election.election_id.as_str(), &peer))
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    assert!(node.is_leader().await);
    let after: Vec<MessageType> = drain(&mut peer_inbox).into_iter().map(|m| m.message_type).collect();
    assert_eq!(after, vec![MessageType::Coordinator]);
}

/// A second OK for the same election is a no-op
#[tokio::test(start_paused = true)]
async fn test_duplicate_ok_is_ignored() {
    let _ = try_init();

    let bus = LocalBus::new();
    let mut peer_inbox = bus.register_mailbox("b");
    let peer = NodeIdentity::with_birth_time("b", 100);
    let node = spawn_node(&bus, "a", 300, &["b"]);

    let runner = tokio::spawn({
        let node = node.clone();
        async move { node.start_election().await }
    });

    let election = peer_inbox.recv().await.unwrap();
    assert!(node.on_ok(&election.election_id));
    assert!(!node.on_ok(&election.election_id));

    assert_eq!(runner.await.unwrap(), ElectionOutcome::Deferred);
    assert_eq!(node.phase().await, NodePhase::AwaitingCoordinator);
    assert_eq!(node.current_leader_id().await, None);
}

/// Repeated COORDINATOR announcements leave the same state
#[tokio::test(start_paused = true)]
async fn test_duplicate_coordinator_is_idempotent() {
    let _ = try_init();

    let bus = LocalBus::new();
    let _peer_inbox = bus.register_mailbox("b");
    let peer = NodeIdentity::with_birth_time("b", 100);
    let node = spawn_node(&bus, "a", 300, &["b"]);

    for _ in 0..2 {
        bus.deliver("a", ElectionMessage::coordinator(&peer)).unwrap();
    }
    sleep(Duration::from_millis(100)).await;

    assert_eq!(node.phase().await, NodePhase::Follower);
    assert_eq!(node.current_leader_id().await.as_deref(), Some("b"));
    assert!(!node.is_leader().await);
}

/// With every peer silent the election settles within the OK wait
#[tokio::test(start_paused = true)]
async fn test_ok_wait_is_bounded() {
    let _ = try_init();

    let bus = LocalBus::new();
    let _b = bus.register_mailbox("b");
    let _c = bus.register_mailbox("c");
    let node = spawn_node(&bus, "a", 300, &["b", "c", "gone"]);

    let started = Instant::now();
    let outcome = node.start_election().await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, ElectionOutcome::BecameLeader);
    assert!(elapsed >= Duration::from_millis(3000));
    assert!(elapsed < Duration::from_millis(3100));
}

/// Concurrent callers share one election round
#[tokio::test(start_paused = true)]
async fn test_concurrent_elections_coalesce() {
    let _ = try_init();

    let bus = LocalBus::new();
    let mut peer_inbox = bus.register_mailbox("b");
    let node = spawn_node(&bus, "a", 100, &["b"]);

    let (first, second, third) = tokio::join!(
        node.start_election(),
        node.start_election(),
        node.start_election()
    );
    assert_eq!(first, ElectionOutcome::BecameLeader);
    assert_eq!(second, ElectionOutcome::BecameLeader);
    assert_eq!(third, ElectionOutcome::BecameLeader);

    sleep(Duration::from_millis(100)).await;
    let elections = drain(&mut peer_inbox)
        .into_iter()
        .filter(|m| m.message_type == MessageType::Election)
        .count();
    assert_eq!(elections, 1);
}

/// A caller giving up mid-round does not leave the node stuck electing
#[tokio::test(start_paused = true)]
async fn test_abandoned_election_still_settles() -> Result<(), Box<dyn std::error::Error>> {
    let _ = try_init();

    let bus = LocalBus::new();
    let _b = bus.register_mailbox("b");
    let node = spawn_node(&bus, "a", 100, &["b"]);

    let abandoned = tokio::time::timeout(Duration::from_millis(100), node.start_election()).await;
    assert!(abandoned.is_err());
    assert_eq!(node.phase().await, NodePhase::Electing);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(node.phase().await, NodePhase::Leader);
    assert_eq!(node.current_leader_id().await.as_deref(), Some("a"));

    let outcome = tokio::time::timeout(Duration::from_secs(60), node.start_election()).await?;
    assert_eq!(outcome, ElectionOutcome::BecameLeader);
    assert!(node.check_invariants().await.is_ok());
    Ok(())
}

/// A deferring node re-elects when the promised COORDINATOR never comes
#[tokio::test(start_paused = true)]
async fn test_missing_coordinator_triggers_reelection() {
    let _ = try_init();

    let bus = LocalBus::new();
    let mut peer_inbox = bus.register_mailbox("b");
    let peer = NodeIdentity::with_birth_time("b", 100);
    let node = spawn_node(&bus, "a", 300, &["b"]);

    let runner = tokio::spawn({
        let node = node.clone();
        async move { node.start_election().await }
    });
    let election = peer_inbox.recv().await.unwrap();
    bus.deliver("a", ElectionMessage::ok(election.election_id.as_str(), &peer))
        .unwrap();
    assert_eq!(runner.await.unwrap(), ElectionOutcome::Deferred);

    // coordinator wait (5s) followed by an unanswered election (3s)
    sleep(Duration::from_secs(9)).await;

    assert!(node.is_leader().await);
    let elections = drain(&mut peer_inbox)
        .into_iter()
        .filter(|m| m.message_type == MessageType::Election)
        .count();
    assert_eq!(elections, 1);
}

/// A COORDINATOR seen during our own round wins over a later OK
#[tokio::test(start_paused = true)]
async fn test_coordinator_during_election_keeps_follower() {
    let _ = try_init();

    let bus = LocalBus::new();
    let mut peer_inbox = bus.register_mailbox("b");
    let peer = NodeIdentity::with_birth_time("b", 100);
    let node = spawn_node(&bus, "a", 300, &["b"]);

    let runner = tokio::spawn({
        let node = node.clone();
        async move { node.start_election().await }
    });
    let election = peer_inbox.recv().await.unwrap();
    bus.deliver("a", ElectionMessage::coordinator(&peer)).unwrap();
    bus.deliver("a", ElectionMessage::ok(election.election_id.as_str(), &peer))
        .unwrap();

    assert_eq!(runner.await.unwrap(), ElectionOutcome::Deferred);
    sleep(Duration::from_secs(10)).await;

    assert_eq!(node.phase().await, NodePhase::Follower);
    assert_eq!(node.current_leader_id().await.as_deref(), Some("b"));
    assert!(drain(&mut peer_inbox).is_empty());
}

/// Only a strictly older node answers OK, and only to a younger sender
#[tokio::test(start_paused = true)]
async fn test_younger_node_never_answers_older() {
    let _ = try_init();

    let bus = LocalBus::new();
    let mut older_inbox = bus.register_mailbox("a");
    let mut younger_inbox = bus.register_mailbox("d");
    let older = NodeIdentity::with_birth_time("a", 100);
    let twin = NodeIdentity::with_birth_time("t", 300);
    let younger = NodeIdentity::with_birth_time("d", 400);
    let node = spawn_node(&bus, "c", 300, &["a", "d"]);

    bus.deliver("c", ElectionMessage::election("from-older", &older)).unwrap();
    bus.deliver("c", ElectionMessage::election("from-twin", &twin)).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut older_inbox).is_empty());
    assert_eq!(node.phase().await, NodePhase::Discovering);

    bus.deliver("c", ElectionMessage::election("from-younger", &younger))
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    let replies = drain(&mut younger_inbox);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].message_type, MessageType::Ok);
    assert_eq!(replies[0].election_id, "from-younger");
    assert_eq!(replies[0].sender_id, "c");

    // the settle delay has passed by now, so our own candidacy is under way
    sleep(Duration::from_millis(200)).await;
    assert_eq!(node.phase().await, NodePhase::Electing);
}
