//! Analysis orchestration: one completed recording in, one session out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mosim_common::time::{generate_session_id, now};
use mosim_common::{LandmarkFrame, Sequence, SequenceRole, TestType, TrackingModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::channels::{derive_channels, ChannelKind, PerChannel};
use super::dtw::{Dtw, DtwResult};
use super::normalize::Normalization;
use super::series::{FeatureSeries, FrameLayout};
use super::similarity::SimilarityScorer;
use crate::error::{AnalysisError, AnalysisResult};
use crate::templates::ReferenceLibrary;

/// A completed recording reported by the capture pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingRequest {
    #[serde(default)]
    pub patient_id: Option<String>,
    pub test_type: TestType,
    /// Generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    /// Defaults to the reference template's model
    #[serde(default)]
    pub model: Option<TrackingModel>,
    /// Capture rate hint, recorded but not used for scoring
    #[serde(default)]
    pub fps: Option<f64>,
    pub live_sequence: Vec<LandmarkFrame>,
}

/// DTW outcome and score of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcome {
    pub similarity: f64,
    pub dtw: DtwResult,
}

/// One persisted analysis result; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSession {
    pub session_id: String,
    pub test_type: TestType,
    pub patient_id: Option<String>,
    pub model: TrackingModel,
    pub created_at: DateTime<Utc>,
    pub fps: Option<f64>,
    /// Frames received, including landmark-free ones
    pub frames_seen: usize,
    /// Landmark-free frames skipped before analysis
    pub frames_dropped: usize,
    pub live_len: usize,
    pub ref_len: usize,
    pub layout: FrameLayout,
    pub normalization: Normalization,
    pub channels: PerChannel<ChannelOutcome>,
    pub overall_similarity: f64,
    /// Position channels at full resolution, for the axis-aggregate view
    pub live_position: FeatureSeries,
    pub reference_position: FeatureSeries,
}

impl AnalysisSession {
    pub fn channel(&self, kind: ChannelKind) -> &ChannelOutcome {
        self.channels.get(kind)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            test_type: self.test_type.clone(),
            patient_id: self.patient_id.clone(),
            created_at: self.created_at,
            frames_seen: self.frames_seen,
            frames_dropped: self.frames_dropped,
            live_len: self.live_len,
            ref_len: self.ref_len,
            channel_distances: self.channels.map(|c| c.dtw.distance),
            channel_similarities: self.channels.map(|c| c.similarity),
            overall_similarity: self.overall_similarity,
        }
    }
}

/// Row of the session list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub test_type: TestType,
    pub patient_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub frames_seen: usize,
    pub frames_dropped: usize,
    pub live_len: usize,
    pub ref_len: usize,
    pub channel_distances: PerChannel<f64>,
    pub channel_similarities: PerChannel<f64>,
    pub overall_similarity: f64,
}

/// Compares live recordings against the reference library.
///
/// Holds no mutable state; one engine serves concurrent analyses.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    references: Arc<ReferenceLibrary>,
    dtw: Dtw,
    scorer: SimilarityScorer,
    normalization: Normalization,
}

impl AnalysisEngine {
    pub fn new(
        references: ReferenceLibrary,
        dtw: Dtw,
        scorer: SimilarityScorer,
        normalization: Normalization,
    ) -> Self {
        Self {
            references: Arc::new(references),
            dtw,
            scorer,
            normalization,
        }
    }

    pub fn references(&self) -> &ReferenceLibrary {
        &self.references
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Run the full pipeline for one recording.
    ///
    /// CPU-bound; async callers should run it on a blocking thread.
    ///
    /// # Errors
    ///
    /// `MissingReferenceTemplate` when the test type has no reference, any
    /// channel derivation error for either sequence, and `DimensionMismatch`
    /// when live and reference topologies differ.
    pub fn analyze(&self, request: RecordingRequest) -> AnalysisResult<AnalysisSession> {
        let created_at = now();
        self.analyze_at(request, created_at)
    }

    /// [`analyze`](Self::analyze) with an explicit creation time
    pub fn analyze_at(
        &self,
        request: RecordingRequest,
        created_at: DateTime<Utc>,
    ) -> AnalysisResult<AnalysisSession> {
        let reference = self
            .references
            .get(&request.test_type)
            .ok_or_else(|| AnalysisError::MissingReferenceTemplate(request.test_type.clone()))?;

        let session_id = request
            .session_id
            .unwrap_or_else(|| generate_session_id(created_at));
        let model = request.model.unwrap_or(reference.model);

        // Frames where the tracker lost the subject carry no landmarks
        let frames_seen = request.live_sequence.len();
        let frames: Vec<LandmarkFrame> = request
            .live_sequence
            .into_iter()
            .filter(|frame| !frame.is_empty())
            .collect();
        let frames_dropped = frames_seen - frames.len();
        if frames_dropped > 0 {
            debug!(
                session_id = %session_id,
                frames_seen,
                frames_dropped,
                "Skipped landmark-free frames"
            );
        }
        let live = Sequence::new(SequenceRole::Live, request.test_type.clone(), model, frames);

        let live_channels = derive_channels(&live, self.normalization)?;
        let ref_channels = derive_channels(&reference, self.normalization)?;
        if live_channels.layout != ref_channels.layout {
            return Err(AnalysisError::DimensionMismatch {
                live: live_channels.layout.dim(),
                reference: ref_channels.layout.dim(),
            });
        }
        debug!(
            session_id = %session_id,
            landmarks = live_channels.layout.landmarks,
            coords = live_channels.layout.coords,
            "Channels derived"
        );

        let channels = PerChannel::try_build(|kind| {
            let dtw = self.dtw.align(live_channels.get(kind), ref_channels.get(kind))?;
            let similarity = self.scorer.similarity(kind, dtw.avg_step_cost);
            Ok::<_, AnalysisError>(ChannelOutcome { similarity, dtw })
        })?;
        let overall_similarity = self.scorer.overall(&channels.map(|c| c.similarity));

        info!(
            session_id = %session_id,
            test_type = %request.test_type,
            live_len = live_channels.len(),
            ref_len = ref_channels.len(),
            path_len = channels.position.dtw.path.len(),
            overall = overall_similarity,
            "Analysis complete"
        );

        Ok(AnalysisSession {
            session_id,
            test_type: request.test_type,
            patient_id: request.patient_id,
            model,
            created_at,
            fps: request.fps,
            frames_seen,
            frames_dropped,
            live_len: live_channels.len(),
            ref_len: ref_channels.len(),
            layout: live_channels.layout,
            normalization: self.normalization,
            channels,
            overall_similarity,
            live_position: live_channels.series.position,
            reference_position: ref_channels.series.position,
        })
    }
}
