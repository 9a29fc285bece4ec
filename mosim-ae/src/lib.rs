//! mosim-ae library - Motion-similarity Analysis Engine
//!
//! Compares a patient's recorded movement test against the reference
//! performance of the same exercise and stores the scored alignment for
//! later review.

pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod templates;

pub use crate::error::{AnalysisError, AnalysisResult, ApiError, ApiResult};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analysis::AnalysisEngine;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session store
    pub db: SqlitePool,
    /// Stateless engine with the loaded reference library
    pub engine: Arc<AnalysisEngine>,
    /// Upper bound on one analysis, including queueing for a blocking thread
    pub analysis_timeout: Duration,
    /// Request body limit for recordings
    pub max_body_bytes: usize,
    /// Session ids with an analysis running
    pub in_flight: Arc<Mutex<HashSet<String>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server-side error, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, engine: AnalysisEngine) -> Self {
        Self {
            db,
            engine: Arc::new(engine),
            analysis_timeout: Duration::from_secs(120),
            max_body_bytes: 64 * 1024 * 1024,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Remember a server-side failure for the health report
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .merge(api::recording_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
