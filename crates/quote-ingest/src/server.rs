//! HTTP endpoints for quotes

use crate::error::IngestError;
use crate::pipeline::QuotePipeline;
use crate::relay::QUOTE_DELIVERIES_PATH;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use quote_types::{normalize_symbol, QuoteRecord};
use serde_json::json;

/// Quote read routes and the relay delivery endpoint
pub fn quote_router(pipeline: QuotePipeline) -> Router {
    Router::new()
        .route("/quotes", get(list_quotes))
        .route("/quotes/:symbol", get(quotes_by_symbol))
        .route(QUOTE_DELIVERIES_PATH, post(accept_delivery))
        .with_state(pipeline)
}

async fn list_quotes(State(pipeline): State<QuotePipeline>) -> Result<Json<Vec<QuoteRecord>>, IngestError> {
    Ok(Json(pipeline.store().find_all().await?))
}

async fn quotes_by_symbol(
    State(pipeline): State<QuotePipeline>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<QuoteRecord>>, IngestError> {
    let symbol = normalize_symbol(&symbol);
    let records = pipeline.store().find_by_symbol(&symbol).await?;
    if records.is_empty() {
        return Err(IngestError::NotFound(symbol));
    }
    Ok(Json(records))
}

async fn accept_delivery(
    State(pipeline): State<QuotePipeline>,
    Json(record): Json<QuoteRecord>,
) -> impl IntoResponse {
    let disposition = pipeline.process(&record).await;
    let status = if disposition.is_ack() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "disposition": disposition.to_string() })))
}

// Error handling
impl IntoResponse for IngestError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            IngestError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            IngestError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            IngestError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
