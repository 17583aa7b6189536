//! Assembled node serving status, election and quote routes

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use quote_ingest::StorageConfig;
use quote_node::{NodeConfig, QuoteNode};
use tower::ServiceExt;

fn memory_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.cluster.node_id = "127.0.0.1:18081".to_string();
    config.ingest.storage = StorageConfig::Memory;
    config
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn delivery() -> Request<Body> {
    let body = r#"{
        "symbol": "PETR4",
        "shortName": "PETROBRAS PN",
        "longName": "Petroleo Brasileiro",
        "price": 38.52,
        "observedAt": "2024-03-01T17:00:00Z"
    }"#;
    Request::builder()
        .method("POST")
        .uri("/quotes/deliveries")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// Merged routes answer and deliveries persist only once the node leads
#[tokio::test]
async fn test_node_routes() -> Result<(), Box<dyn std::error::Error>> {
    let node = QuoteNode::build(memory_config())?;
    let app = node.router();

    let (status, body) = send(&app, Request::builder().uri("/status/ping").body(Body::empty())?).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "alive"));

    let (status, _) = send(&app, delivery()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    node.engine().become_leader().await;
    let (status, body) = send(&app, Request::builder().uri("/status").body(Body::empty())?).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "leader"));

    let (status, body) = send(&app, delivery()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("persisted"));

    let (status, body) = send(&app, Request::builder().uri("/quotes/PETR4").body(Body::empty())?).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"symbol\":\"PETR4\""));

    node.engine().shutdown();
    Ok(())
}

/// A sled store is opened at the configured path
#[tokio::test]
async fn test_node_with_sled_store() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut config = memory_config();
    config.ingest.storage = StorageConfig::Sled {
        path: dir.path().join("quotes"),
    };

    let node = QuoteNode::build(config)?;
    let (status, body) = send(&node.router(), Request::builder().uri("/quotes").body(Body::empty())?).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "[]"));
    Ok(())
}
