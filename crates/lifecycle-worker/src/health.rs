//! HTTP health endpoint for the worker process.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use lifecycle_queue::{Consumer, Publisher};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shared state for the health endpoint
#[derive(Debug, Clone)]
pub struct HealthState {
    pub consumer: Consumer,
    pub publisher: Publisher,
}

/// Body returned by `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Messages decoded but not yet acked or abandoned
    pub pending_acks: usize,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(handle_health_check))
        .with_state(state)
}

/// Both queues must still resolve for the worker to report healthy
async fn handle_health_check(State(state): State<HealthState>) -> impl IntoResponse {
    let probe = match state.consumer.ping().await {
        Ok(()) => state.publisher.ping().await,
        Err(e) => Err(e),
    };
    let pending_acks = state.consumer.pending_acks();

    match probe {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                error: None,
                pending_acks,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    error: Some(e.to_string()),
                    pending_acks,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
