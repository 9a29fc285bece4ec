//! Optional anatomical normalisation of flattened frames
//!
//! Removes the subject's position in the camera frame and, for the known
//! topologies, their body size, so that live and reference recordings of
//! different people compare on shape alone.

use mosim_common::TrackingModel;
use serde::{Deserialize, Serialize};

use super::series::FrameLayout;
use crate::error::{AnalysisError, AnalysisResult};

/// Added to every scale so a collapsed skeleton never divides by zero
const SCALE_EPSILON: f64 = 1e-6;

const HAND_WRIST: usize = 0;
const HAND_MIDDLE_MCP: usize = 9;

const POSE_LEFT_SHOULDER: usize = 11;
const POSE_RIGHT_SHOULDER: usize = 12;
const POSE_LEFT_HIP: usize = 23;
const POSE_RIGHT_HIP: usize = 24;

/// Normalisation applied to every frame before channel derivation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Raw tracker coordinates
    #[default]
    None,
    /// Anchor-relative, body-size-scaled coordinates
    Anatomical,
}

/// Normalise one flattened frame in place.
///
/// - `Hands`: wrist is the origin, unit is wrist to middle-finger MCP.
/// - `Pose`: mid-hip is the origin, unit is shoulder width.
/// - `Generic`: centroid is the origin, no scaling.
///
/// Fails with `InvalidLandmarkIndex` when the frame lacks an anchor landmark.
pub fn normalize_frame(
    frame: &mut [f64],
    layout: FrameLayout,
    model: TrackingModel,
) -> AnalysisResult<()> {
    let coords = layout.coords;
    let point = |frame: &[f64], landmark: usize| -> AnalysisResult<Vec<f64>> {
        if landmark >= layout.landmarks {
            return Err(AnalysisError::InvalidLandmarkIndex {
                index: landmark,
                landmarks: layout.landmarks,
            });
        }
        Ok(frame[landmark * coords..(landmark + 1) * coords].to_vec())
    };

    let (origin, scale) = match model {
        TrackingModel::Hands => {
            let wrist = point(frame, HAND_WRIST)?;
            let mcp = point(frame, HAND_MIDDLE_MCP)?;
            let scale = euclidean(&wrist, &mcp) + SCALE_EPSILON;
            (wrist, scale)
        }
        TrackingModel::Pose => {
            let left_hip = point(frame, POSE_LEFT_HIP)?;
            let right_hip = point(frame, POSE_RIGHT_HIP)?;
            let left_shoulder = point(frame, POSE_LEFT_SHOULDER)?;
            let right_shoulder = point(frame, POSE_RIGHT_SHOULDER)?;
            let mid_hip = left_hip
                .iter()
                .zip(&right_hip)
                .map(|(a, b)| (a + b) / 2.0)
                .collect();
            let scale = euclidean(&left_shoulder, &right_shoulder) + SCALE_EPSILON;
            (mid_hip, scale)
        }
        TrackingModel::Generic => (centroid(frame, layout), 1.0),
    };

    for landmark in frame.chunks_exact_mut(coords) {
        for (value, o) in landmark.iter_mut().zip(&origin) {
            *value = (*value - o) / scale;
        }
    }
    Ok(())
}

/// Mean landmark position of a flattened frame
pub(crate) fn centroid(frame: &[f64], layout: FrameLayout) -> Vec<f64> {
    let mut sum = vec![0.0; layout.coords];
    for landmark in frame.chunks_exact(layout.coords) {
        for (s, v) in sum.iter_mut().zip(landmark) {
            *s += v;
        }
    }
    let n = layout.landmarks.max(1) as f64;
    sum.into_iter().map(|s| s / n).collect()
}

pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hand_frame() -> Vec<f64> {
        // wrist at (1, 1), landmark 9 at (1, 3), everything else at (2, 1)
        let mut frame = Vec::new();
        for i in 0..21 {
            match i {
                0 => frame.extend([1.0, 1.0]),
                9 => frame.extend([1.0, 3.0]),
                _ => frame.extend([2.0, 1.0]),
            }
        }
        frame
    }

    #[test]
    fn hands_are_wrist_relative_and_scaled() {
        let layout = FrameLayout {
            landmarks: 21,
            coords: 2,
        };
        let mut frame = hand_frame();
        normalize_frame(&mut frame, layout, TrackingModel::Hands).unwrap();

        assert_eq!(&frame[0..2], &[0.0, 0.0]);
        assert_relative_eq!(frame[19], 1.0, epsilon = 1e-5);
        assert_relative_eq!(frame[2], 0.5, epsilon = 1e-5);
    }

    #[test]
    fn generic_translates_to_centroid() {
        let layout = FrameLayout {
            landmarks: 2,
            coords: 2,
        };
        let mut frame = vec![0.0, 0.0, 4.0, 2.0];
        normalize_frame(&mut frame, layout, TrackingModel::Generic).unwrap();
        assert_eq!(frame, vec![-2.0, -1.0, 2.0, 1.0]);
    }

    #[test]
    fn pose_needs_hip_landmarks() {
        let layout = FrameLayout {
            landmarks: 13,
            coords: 2,
        };
        let mut frame = vec![0.0; 26];
        let err = normalize_frame(&mut frame, layout, TrackingModel::Pose).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidLandmarkIndex { index: 23, landmarks: 13 }
        ));
    }
}
