//! Read-side views of a stored session
//!
//! Every view is computed from the full-resolution session and downsampled
//! on the way out, so the same session can be charted at any resolution.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use mosim_common::{Axis, TestType};
use serde::{Deserialize, Serialize};

use super::{clamp_points, fetch_session};
use crate::analysis::reducer::resolve_landmarks;
use crate::analysis::sampler::sample_indices;
use crate::analysis::{reduce_axis, AnalysisSession, ChannelKind, ReduceMode, Series};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Version of the export bundle layout
pub const EXPORT_FORMAT_VERSION: u32 = 1;

fn default_series_points() -> usize {
    200
}

fn default_axis_points() -> usize {
    600
}

fn default_axis() -> Axis {
    Axis::X
}

/// Query parameters for the series view
#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    #[serde(default)]
    pub channel: ChannelKind,
    #[serde(default = "default_series_points", alias = "maxPoints")]
    pub max_points: usize,
}

/// Per-channel cost curves of one session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub test_type: TestType,
    pub session_id: String,
    pub channel: ChannelKind,
    pub distance: f64,
    pub avg_step_cost: f64,
    pub similarity: f64,
    pub path_len: usize,
    pub live_len: usize,
    pub ref_len: usize,
    /// x = path step, y = local cost
    pub per_step_cost: Series,
    /// x = path step, y = fraction of total cost so far
    pub cumulative_progress: Series,
    /// x = live frame, y = aligned reference frame
    pub alignment_map: Series,
}

/// GET /dtw/sessions/:test_type/:session_id/series
pub async fn series(
    State(state): State<AppState>,
    Path((test_type, session_id)): Path<(String, String)>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Json<SeriesResponse>> {
    let session = fetch_session(&state, &test_type, &session_id).await?;
    let max_points = clamp_points(query.max_points);
    let outcome = session.channel(query.channel);
    let dtw = &outcome.dtw;

    let alignment: Vec<f64> = dtw.alignment_map().into_iter().map(|j| j as f64).collect();

    Ok(Json(SeriesResponse {
        test_type: session.test_type.clone(),
        session_id: session.session_id.clone(),
        channel: query.channel,
        distance: dtw.distance,
        avg_step_cost: dtw.avg_step_cost,
        similarity: outcome.similarity,
        path_len: dtw.path.len(),
        live_len: session.live_len,
        ref_len: session.ref_len,
        per_step_cost: Series::indexed(dtw.step_costs.iter().copied()).downsample(max_points)?,
        cumulative_progress: Series::indexed(dtw.cumulative_progress.iter().copied())
            .downsample(max_points)?,
        alignment_map: Series::indexed(alignment).downsample(max_points)?,
    }))
}

/// Query parameters for the axis-aggregate view
#[derive(Debug, Deserialize)]
pub struct AxisAggregateQuery {
    #[serde(default = "default_axis")]
    pub axis: Axis,
    #[serde(default)]
    pub reduce: ReduceMode,
    /// Comma-separated landmark indices, or "all"
    #[serde(default)]
    pub landmarks: Option<String>,
    #[serde(default = "default_axis_points", alias = "maxPoints")]
    pub max_points: usize,
}

/// Warping path as parallel index arrays
#[derive(Debug, Serialize)]
pub struct PathView {
    pub live: Vec<usize>,
    pub reference: Vec<usize>,
}

/// Reduced values of each aligned pair
#[derive(Debug, Serialize)]
pub struct AlignedValues {
    /// Path step of each pair
    pub step: Vec<usize>,
    pub live: Vec<f64>,
    pub reference: Vec<f64>,
}

/// Three-panel comparison data
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisAggregateResponse {
    pub test_type: TestType,
    pub session_id: String,
    pub axis: Axis,
    pub reduce: ReduceMode,
    pub landmarks: Vec<usize>,
    pub live: Series,
    pub reference: Series,
    pub path: PathView,
    pub aligned: AlignedValues,
}

/// `None` for absent, empty or "all"
fn parse_landmarks(raw: Option<&str>) -> ApiResult<Option<Vec<usize>>> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid landmark index '{}'", part.trim())))
        })
        .collect::<ApiResult<Vec<_>>>()
        .map(Some)
}

/// GET /dtw/sessions/:test_type/:session_id/axis_agg
///
/// Alignment always comes from the position channel's warping path.
pub async fn axis_aggregate(
    State(state): State<AppState>,
    Path((test_type, session_id)): Path<(String, String)>,
    Query(query): Query<AxisAggregateQuery>,
) -> ApiResult<Json<AxisAggregateResponse>> {
    let session = fetch_session(&state, &test_type, &session_id).await?;
    let max_points = clamp_points(query.max_points);
    let subset = parse_landmarks(query.landmarks.as_deref())?;

    let landmarks = resolve_landmarks(session.layout, subset.as_deref())?;
    let live = reduce_axis(
        &session.live_position,
        session.layout,
        query.axis,
        query.reduce,
        Some(&landmarks),
    )?;
    let reference = reduce_axis(
        &session.reference_position,
        session.layout,
        query.axis,
        query.reduce,
        Some(&landmarks),
    )?;

    let path = &session.channel(ChannelKind::Position).dtw.path;
    let steps = sample_indices(path.len(), max_points)?;
    let picked: Vec<(usize, usize)> = steps
        .iter()
        .map(|&k| {
            let s = path.steps()[k];
            (s.live, s.reference)
        })
        .collect();

    let aligned = AlignedValues {
        step: steps.clone(),
        live: picked.iter().map(|&(i, _)| live[i]).collect(),
        reference: picked.iter().map(|&(_, j)| reference[j]).collect(),
    };
    let path_view = PathView {
        live: picked.iter().map(|&(i, _)| i).collect(),
        reference: picked.iter().map(|&(_, j)| j).collect(),
    };

    Ok(Json(AxisAggregateResponse {
        test_type: session.test_type.clone(),
        session_id: session.session_id.clone(),
        axis: query.axis,
        reduce: query.reduce,
        landmarks,
        live: Series::indexed(live).downsample(max_points)?,
        reference: Series::indexed(reference).downsample(max_points)?,
        path: path_view,
        aligned,
    }))
}

/// Full-resolution session bundle for offline analysis
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub session: AnalysisSession,
}

/// GET /dtw/sessions/:test_type/:session_id/export
pub async fn export(
    State(state): State<AppState>,
    Path((test_type, session_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let session = fetch_session(&state, &test_type, &session_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}_{}.json\"",
        session.test_type, session.session_id
    );
    let bundle = ExportBundle {
        format_version: EXPORT_FORMAT_VERSION,
        exported_at: Utc::now(),
        session,
    };
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(bundle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_lists() {
        assert_eq!(parse_landmarks(None).unwrap(), None);
        assert_eq!(parse_landmarks(Some("all")).unwrap(), None);
        assert_eq!(parse_landmarks(Some(" ")).unwrap(), None);
        assert_eq!(parse_landmarks(Some("4, 8,12")).unwrap(), Some(vec![4, 8, 12]));
        assert!(matches!(
            parse_landmarks(Some("4,x")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
