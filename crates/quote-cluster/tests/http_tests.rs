//! HTTP transport tests against a mock peer

use quote_cluster::{
    ClusterConfig, ClusterError, ElectionEngine, ElectionMessage, ElectionOutcome,
    ElectionTransport, HttpPeers, KnownPeers, NodeIdentity, NodePhase, NodeRole, PeerProbe,
    StatusReport,
};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::fmt::try_init;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_peers(server: &MockServer) -> (HttpPeers, String) {
    let peer = server.address().to_string();
    let peers = KnownPeers::new("127.0.0.1:1", [peer.as_str()]);
    let client = HttpPeers::new(peers, Duration::from_millis(300)).unwrap();
    (client, peer)
}

#[tokio::test]
async fn test_send_to_posts_message() -> Result<(), Box<dyn std::error::Error>> {
    let _ = try_init();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/election/messages"))
        .and(body_partial_json(json!({
            "type": "ELECTION",
            "electionId": "round-1",
            "senderId": "127.0.0.1:1",
            "senderBirthTime": 10
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let (client, peer) = http_peers(&server);
    let sender = NodeIdentity::with_birth_time("127.0.0.1:1", 10);
    client
        .send_to(&peer, ElectionMessage::election("round-1", &sender))
        .await?;

    Ok(())
}

#[tokio::test]
async fn test_send_to_rejects_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/election/messages"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (client, peer) = http_peers(&server);
    let sender = NodeIdentity::with_birth_time("127.0.0.1:1", 10);
    let result = client.send_to(&peer, ElectionMessage::coordinator(&sender)).await;

    assert!(matches!(result, Err(ClusterError::UnexpectedResponse { .. })));
}

#[tokio::test]
async fn test_broadcast_reaches_every_peer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/election/messages"))
        .and(body_partial_json(json!({ "type": "COORDINATOR" })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = http_peers(&server);
    let sender = NodeIdentity::with_birth_time("127.0.0.1:1", 10);
    client.broadcast(ElectionMessage::coordinator(&sender)).await;
}

#[tokio::test]
async fn test_status_probe_parses_report() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nodeId": "127.0.0.1:2",
            "role": "leader",
            "phase": "leader",
            "leaderId": "127.0.0.1:2",
            "birthTime": 5
        })))
        .mount(&server)
        .await;

    let (client, peer) = http_peers(&server);
    let report: StatusReport = client.status(&peer).await?;

    assert!(report.is_leader());
    assert_eq!(report.role, NodeRole::Leader);
    assert_eq!(report.phase, NodePhase::Leader);
    assert_eq!(report.birth_time, 5);
    Ok(())
}

#[tokio::test]
async fn test_ping_returns_body_and_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("alive"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/ping"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("alive")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let (client, peer) = http_peers(&server);
    assert_eq!(client.ping(&peer).await.unwrap(), "alive");

    let slow = client.ping(&peer).await;
    assert!(matches!(slow, Err(ClusterError::Timeout(_))));
}

#[tokio::test]
async fn test_unhealthy_leader_is_replaced() {
    let _ = try_init();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/ping"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/election/messages"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let leader = server.address().to_string();
    let mut config = ClusterConfig::new("127.0.0.1:1", vec![leader.clone()]);
    config.ok_wait_ms = 200;
    config.probe_timeout_ms = 500;
    let engine = ElectionEngine::with_http(NodeIdentity::with_birth_time("127.0.0.1:1", 10), &config)
        .unwrap();
    engine.on_coordinator(&leader).await;

    let outcome = engine.ping_leader().await;

    assert_eq!(outcome, Some(ElectionOutcome::BecameLeader));
    assert!(engine.is_leader().await);
}
