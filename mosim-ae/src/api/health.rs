//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when no reference template is loaded
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Reference templates available for analysis
    pub templates: usize,
    /// Analyses currently running
    pub in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;
    let last_error = state.last_error.read().await.clone();
    let in_flight = state.in_flight.lock().map(|set| set.len()).unwrap_or(0);
    let templates = state.engine.references().len();

    Json(HealthResponse {
        status: if templates > 0 { "ok" } else { "degraded" }.to_string(),
        module: "mosim-ae".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        templates,
        in_flight,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
