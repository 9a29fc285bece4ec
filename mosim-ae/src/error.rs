//! Error types for mosim-ae
//!
//! `AnalysisError` is the engine's failure taxonomy. Every variant is local
//! to one request: none of them touch the session store and none are
//! transient, so callers must not retry them. `ApiError` maps both engine
//! and storage failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mosim_common::{Axis, TestType};
use serde_json::json;
use thiserror::Error;

use crate::analysis::ChannelKind;

/// Engine failure taxonomy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Sequence too short for speed, amplitude or PCA
    #[error("sequence has {actual} frame(s), at least {required} required")]
    InsufficientFrames { required: usize, actual: usize },

    /// A DTW input had no frames at all
    #[error("sequence must contain at least one frame")]
    EmptySequence,

    /// Live and reference frames have different dimensionality
    #[error("live frames have dimension {live}, reference frames have dimension {reference}")]
    DimensionMismatch { live: usize, reference: usize },

    /// Requested landmark outside the tracking topology
    #[error("landmark index {index} out of range 0..{landmarks}")]
    InvalidLandmarkIndex { index: usize, landmarks: usize },

    /// No reference performance configured for the test type
    #[error("no reference template configured for test type '{0}'")]
    MissingReferenceTemplate(TestType),

    /// Session id not present in the store
    #[error("unknown session '{0}'")]
    UnknownSession(String),

    /// Landmark subset given but empty
    #[error("landmark subset must not be empty")]
    EmptyLandmarkSubset,

    /// Axis not captured by the tracker (e.g. `z` on 2D data)
    #[error("axis '{axis}' not available ({coords} coordinate(s) per landmark)")]
    AxisUnavailable { axis: Axis, coords: usize },

    /// A frame's landmark count differs from the first frame's
    #[error("frame {frame} has {actual} landmark(s), expected {expected}")]
    InconsistentFrame {
        frame: usize,
        expected: usize,
        actual: usize,
    },

    /// NaN or infinite coordinate
    #[error("frame {frame} contains a non-finite coordinate")]
    NonFiniteValue { frame: usize },

    /// Finite input whose derived value overflowed to infinity
    #[error("{channel} value at frame {frame} overflows; input coordinates are too large")]
    DerivedOverflow { channel: ChannelKind, frame: usize },

    /// Sampler budget too small to keep both endpoints
    #[error("point budget {0} too small, at least 2 required")]
    InvalidPointBudget(usize),
}

/// Result alias for engine operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine rejected the request
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - duplicate session or analysis already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Analysis exceeded the configured time limit (504)
    #[error("Analysis timed out after {0} s")]
    Timeout(u64),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// mosim-common error
    #[error("Common error: {0}")]
    Common(#[from] mosim_common::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Analysis(err) => match err {
                AnalysisError::InsufficientFrames { .. }
                | AnalysisError::EmptySequence
                | AnalysisError::DimensionMismatch { .. }
                | AnalysisError::InconsistentFrame { .. }
                | AnalysisError::NonFiniteValue { .. }
                | AnalysisError::DerivedOverflow { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE")
                }
                AnalysisError::InvalidLandmarkIndex { .. }
                | AnalysisError::EmptyLandmarkSubset
                | AnalysisError::AxisUnavailable { .. }
                | AnalysisError::InvalidPointBudget(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                AnalysisError::UnknownSession(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                AnalysisError::MissingReferenceTemplate(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "MISSING_REFERENCE_TEMPLATE",
                ),
            },
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Common(err) => match err {
                mosim_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                mosim_common::Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                mosim_common::Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        } else {
            tracing::debug!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
