//! The ingest surface: a small axum app that accepts envelope batches and
//! incident messages, feeding the consumer and lookout drivers' channels.
//!
//! This is deliberately not a serving layer; reads over the reduced data
//! live elsewhere in the control plane.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use frameworks_model::EventEnvelope;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct IngestState {
    events: mpsc::Sender<Vec<EventEnvelope>>,
    incidents: mpsc::Sender<Vec<u8>>,
}

pub fn app(
    events: mpsc::Sender<Vec<EventEnvelope>>,
    incidents: mpsc::Sender<Vec<u8>>,
) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/events", post(ingest_events))
        .route("/v1/incidents", post(ingest_incident))
        .layer(TraceLayer::new_for_http())
        .with_state(IngestState { events, incidents })
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ingest_events(
    State(state): State<IngestState>,
    Json(envelopes): Json<Vec<EventEnvelope>>,
) -> impl IntoResponse {
    let accepted = envelopes.len();
    if let Err(err) = state.events.send(envelopes).await {
        warn!(error = %err, "ingest channel closed, rejecting batch");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "ingest pipeline unavailable" })),
        );
    }
    (StatusCode::ACCEPTED, Json(json!({ "accepted": accepted })))
}

/// Accepts one incident-bus message as an opaque body. Malformed payloads
/// are still accepted here; the lookout trigger logs and drops them, the
/// same contract the bus consumer honors.
async fn ingest_incident(
    State(state): State<IngestState>,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(err) = state.incidents.send(body.to_vec()).await {
        warn!(error = %err, "incident channel closed, rejecting message");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "lookout pipeline unavailable" })),
        );
    }
    (StatusCode::ACCEPTED, Json(json!({ "accepted": 1 })))
}
