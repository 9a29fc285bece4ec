//! Session listing and lookup

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use mosim_common::TestType;

use super::{parse_test_type, views};
use crate::analysis::SessionSummary;
use crate::db::sessions::{self, SessionRef};
use crate::error::{AnalysisError, ApiResult};
use crate::AppState;

/// GET /dtw/tests
///
/// Test types with at least one stored session.
pub async fn list_tests(State(state): State<AppState>) -> ApiResult<Json<Vec<TestType>>> {
    Ok(Json(sessions::list_test_types(&state.db).await?))
}

/// GET /dtw/sessions/:test_type
///
/// Newest first. An unknown test type has no sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(test_type): Path<String>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let test_type = parse_test_type(&test_type)?;
    Ok(Json(sessions::list_sessions(&state.db, &test_type).await?))
}

/// GET /dtw/lookup/:session_id
pub async fn lookup_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionRef>> {
    let found = sessions::lookup_session(&state.db, &session_id)
        .await?
        .ok_or(AnalysisError::UnknownSession(session_id))?;
    Ok(Json(found))
}

/// Build session read routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/dtw/tests", get(list_tests))
        .route("/dtw/sessions/:test_type", get(list_sessions))
        .route("/dtw/lookup/:session_id", get(lookup_session))
        .route(
            "/dtw/sessions/:test_type/:session_id/series",
            get(views::series),
        )
        .route(
            "/dtw/sessions/:test_type/:session_id/axis_agg",
            get(views::axis_aggregate),
        )
        .route(
            "/dtw/sessions/:test_type/:session_id/export",
            get(views::export),
        )
}
