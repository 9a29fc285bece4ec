//! Recording submission and reference listing
//!
//! A completed recording is analysed once, on a blocking thread, and the
//! resulting session is stored in one write. The same session id is never
//! analysed twice concurrently, and a stored id is never overwritten.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mosim_common::time::{generate_session_id, now};
use tracing::{info, warn};

use crate::analysis::{RecordingRequest, SessionSummary};
use crate::db::sessions;
use crate::error::{AnalysisError, ApiError, ApiResult};
use crate::templates::TemplateInfo;
use crate::AppState;

/// Longest client-supplied session id
const MAX_SESSION_ID_LEN: usize = 128;

/// Marks a session id as being analysed; released on drop
struct InFlightGuard {
    registry: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl InFlightGuard {
    fn acquire(registry: &Arc<Mutex<HashSet<String>>>, session_id: &str) -> ApiResult<Self> {
        let mut set = registry
            .lock()
            .map_err(|_| ApiError::Internal("in-flight registry poisoned".to_string()))?;
        if !set.insert(session_id.to_string()) {
            return Err(ApiError::Conflict(format!(
                "Session '{}' is already being analysed",
                session_id
            )));
        }
        Ok(Self {
            registry: Arc::clone(registry),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.registry.lock() {
            set.remove(&self.session_id);
        }
    }
}

/// Session ids become URL path segments and file names
pub(crate) fn validate_session_id(id: &str) -> ApiResult<()> {
    if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "Session id must be 1-{} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::BadRequest(format!(
            "Session id '{}' may only contain letters, digits, '-' and '_'",
            id
        )));
    }
    Ok(())
}

/// POST /dtw/recordings
///
/// Analyse a completed recording and store the session. Returns 201 with
/// the session summary.
pub async fn submit_recording(
    State(state): State<AppState>,
    Json(mut request): Json<RecordingRequest>,
) -> ApiResult<(StatusCode, Json<SessionSummary>)> {
    let session_id = match request.session_id.take() {
        Some(id) => {
            validate_session_id(&id)?;
            id
        }
        None => generate_session_id(now()),
    };
    request.session_id = Some(session_id.clone());

    let guard = InFlightGuard::acquire(&state.in_flight, &session_id)?;
    if sessions::lookup_session(&state.db, &session_id).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "Session '{}' already exists",
            session_id
        )));
    }

    info!(
        session_id = %session_id,
        test_type = %request.test_type,
        frames = request.live_sequence.len(),
        "Recording received"
    );

    let engine = Arc::clone(&state.engine);
    // The guard travels with the analysis: after a timeout the task keeps
    // running and the id stays reserved until it finishes
    let task = tokio::task::spawn_blocking(move || {
        let result = engine.analyze(request);
        (guard, result)
    });
    let (_guard, session) = match tokio::time::timeout(state.analysis_timeout, task).await {
        Ok(Ok((guard, Ok(session)))) => (guard, session),
        Ok(Ok((_, Err(err)))) => {
            if matches!(err, AnalysisError::MissingReferenceTemplate(_)) {
                state.record_error(err.to_string()).await;
            }
            return Err(err.into());
        }
        Ok(Err(join_err)) => {
            let message = format!("Analysis task failed: {}", join_err);
            state.record_error(message.clone()).await;
            return Err(ApiError::Internal(message));
        }
        Err(_) => {
            let secs = state.analysis_timeout.as_secs();
            warn!(session_id = %session_id, "Analysis exceeded {} s", secs);
            state
                .record_error(format!("Analysis of '{}' timed out", session_id))
                .await;
            return Err(ApiError::Timeout(secs));
        }
    };

    if let Err(err) = sessions::insert_session(&state.db, &session).await {
        if !matches!(err, mosim_common::Error::Conflict(_)) {
            state
                .record_error(format!("Storing '{}' failed: {}", session_id, err))
                .await;
        }
        return Err(err.into());
    }

    Ok((StatusCode::CREATED, Json(session.summary())))
}

/// GET /dtw/references
pub async fn list_references(State(state): State<AppState>) -> Json<Vec<TemplateInfo>> {
    Json(state.engine.references().describe())
}

/// Build recording routes
pub fn recording_routes() -> Router<AppState> {
    Router::new()
        .route("/dtw/recordings", post(submit_recording))
        .route("/dtw/references", get(list_references))
}
