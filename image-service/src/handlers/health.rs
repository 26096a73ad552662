use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use service_core::error::AppError;

pub const READY_BODY: &str = "Image Processing Service: Ready";

/// Root route; answers every method with 200.
pub async fn root() -> impl IntoResponse {
    (StatusCode::OK, READY_BODY)
}

/// Liveness probe: OK for as long as the listener is up.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": &*state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "lifecycle": state.lifecycle.state().to_string(),
    }))
}

/// Readiness probe. Fails from the first termination signal on so the load
/// balancer drains this instance during the grace period.
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    if state.lifecycle.is_ready() {
        Ok(Json(json!({ "status": "ready" })))
    } else {
        Err(AppError::ServiceUnavailable)
    }
}
