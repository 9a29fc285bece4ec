//! HTTP API handlers for mosim-ae
//!
//! Writes go through `POST /dtw/recordings`; everything else is a read of
//! stored sessions or of the reference library.

pub mod health;
pub mod recordings;
pub mod sessions;
pub mod views;

pub use health::health_routes;
pub use recordings::recording_routes;
pub use sessions::session_routes;

use mosim_common::TestType;

use crate::analysis::AnalysisSession;
use crate::error::{AnalysisError, ApiError, ApiResult};
use crate::AppState;

/// Largest point budget a view query may ask for
pub const MAX_POINTS_LIMIT: usize = 10_000;

/// Clamp a client point budget into `2..=MAX_POINTS_LIMIT`
pub fn clamp_points(requested: usize) -> usize {
    requested.clamp(crate::analysis::sampler::MIN_POINT_BUDGET, MAX_POINTS_LIMIT)
}

/// Parse a test type from a path segment
pub(crate) fn parse_test_type(raw: &str) -> ApiResult<TestType> {
    TestType::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Load a stored session or fail with `UnknownSession`
pub(crate) async fn fetch_session(
    state: &AppState,
    test_type: &str,
    session_id: &str,
) -> ApiResult<AnalysisSession> {
    let test_type = parse_test_type(test_type)?;
    crate::db::sessions::load_session(&state.db, &test_type, session_id)
        .await?
        .ok_or_else(|| AnalysisError::UnknownSession(session_id.to_string()).into())
}
