//! HTTP endpoints served by every node

use crate::communication::{StatusReport, ALIVE, ELECTION_MESSAGES_PATH, STATUS_PING_PATH, STATUS_REPORT_PATH};
use crate::election::ElectionEngine;
use crate::message::ElectionMessage;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio::sync::mpsc;

#[derive(Clone)]
struct NodeApi {
    engine: ElectionEngine,
    inbox: mpsc::UnboundedSender<ElectionMessage>,
}

/// Status and election routes of `engine`.
///
/// Spawns the engine's listener; inbound messages are queued to it.
pub fn election_router(engine: &ElectionEngine) -> Router {
    let (inbox, mailbox) = mpsc::unbounded_channel();
    engine.spawn_listener(mailbox);
    router(engine.clone(), inbox)
}

/// Routes forwarding inbound messages to `inbox`
pub fn router(engine: ElectionEngine, inbox: mpsc::UnboundedSender<ElectionMessage>) -> Router {
    Router::new()
        .route("/status", get(role))
        .route(STATUS_PING_PATH, get(ping))
        .route("/status/uptime", get(uptime))
        .route("/status/leader", get(leader))
        .route(STATUS_REPORT_PATH, get(report))
        .route(ELECTION_MESSAGES_PATH, post(receive))
        .with_state(NodeApi { engine, inbox })
}

async fn role(State(api): State<NodeApi>) -> String {
    api.engine.status_report().await.role.to_string()
}

async fn ping() -> &'static str {
    ALIVE
}

async fn uptime(State(api): State<NodeApi>) -> String {
    api.engine.my_birth_time().to_string()
}

async fn leader(State(api): State<NodeApi>) -> String {
    api.engine
        .current_leader_id()
        .await
        .unwrap_or_else(|| "none".to_string())
}

async fn report(State(api): State<NodeApi>) -> Json<StatusReport> {
    Json(api.engine.status_report().await)
}

async fn receive(State(api): State<NodeApi>, Json(message): Json<ElectionMessage>) -> impl IntoResponse {
    match api.inbox.send(message) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            tracing::error!("Election listener of {} is gone", api.engine.my_id());
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use crate::local_bus::LocalBus;
    use crate::message::MessageType;
    use crate::node::NodeIdentity;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn engine() -> ElectionEngine {
        let bus = LocalBus::new();
        let config = ClusterConfig::new("localhost:8081", vec![]);
        ElectionEngine::on_bus(NodeIdentity::with_birth_time("localhost:8081", 42), &config, &bus)
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_status_routes() {
        let engine = engine();
        let (inbox, _mailbox) = mpsc::unbounded_channel();
        let app = router(engine.clone(), inbox);

        assert_eq!(get_text(app.clone(), "/status").await, (StatusCode::OK, "follower".to_string()));
        assert_eq!(get_text(app.clone(), "/status/ping").await, (StatusCode::OK, "alive".to_string()));
        assert_eq!(get_text(app.clone(), "/status/uptime").await, (StatusCode::OK, "42".to_string()));
        assert_eq!(get_text(app.clone(), "/status/leader").await, (StatusCode::OK, "none".to_string()));

        engine.become_leader().await;
        assert_eq!(get_text(app.clone(), "/status").await.1, "leader");
        assert_eq!(get_text(app.clone(), "/status/leader").await.1, "localhost:8081");

        let (status, body) = get_text(app, "/status/report").await;
        assert_eq!(status, StatusCode::OK);
        let report: StatusReport = serde_json::from_str(&body).unwrap();
        assert!(report.is_leader());
        assert_eq!(report.birth_time, 42);
    }

    #[tokio::test]
    async fn test_election_message_is_queued() {
        let engine = engine();
        let (inbox, mut mailbox) = mpsc::unbounded_channel();
        let app = router(engine, inbox);

        let sender = NodeIdentity::with_birth_time("localhost:8082", 7);
        let body = serde_json::to_string(&ElectionMessage::coordinator(&sender)).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/election/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let queued = mailbox.recv().await.unwrap();
        assert_eq!(queued.message_type, MessageType::Coordinator);
        assert_eq!(queued.sender_id, "localhost:8082");
    }

    #[tokio::test]
    async fn test_closed_listener_is_unavailable() {
        let engine = engine();
        let (inbox, mailbox) = mpsc::unbounded_channel();
        drop(mailbox);
        let app = router(engine, inbox);

        let sender = NodeIdentity::with_birth_time("localhost:8082", 7);
        let body = serde_json::to_string(&ElectionMessage::coordinator(&sender)).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/election/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
