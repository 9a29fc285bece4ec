//! Landmark reduction for the axis-aggregate view
//!
//! Collapses the selected landmarks' coordinate on one axis to a single
//! scalar per frame. Only visualization goes through here; DTW scoring
//! always runs on the full position vectors.

use std::fmt;
use std::str::FromStr;

use mosim_common::Axis;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};

use super::channels::MIN_FRAMES;
use super::series::{FeatureSeries, FrameLayout};
use crate::error::{AnalysisError, AnalysisResult};

/// Components within this distance of the largest magnitude count as tied
const SIGN_TIE_TOLERANCE: f64 = 1e-12;

/// How landmarks are collapsed per frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReduceMode {
    #[default]
    Mean,
    Median,
    /// Projection onto the first principal component
    Pca1,
}

impl ReduceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReduceMode::Mean => "mean",
            ReduceMode::Median => "median",
            ReduceMode::Pca1 => "pca1",
        }
    }
}

impl fmt::Display for ReduceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReduceMode {
    type Err = mosim_common::Error;

    fn from_str(s: &str) -> mosim_common::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ReduceMode::Mean),
            "median" => Ok(ReduceMode::Median),
            "pca1" | "pca" => Ok(ReduceMode::Pca1),
            other => Err(mosim_common::Error::InvalidInput(format!(
                "Unknown reduce mode '{}' (expected mean, median or pca1)",
                other
            ))),
        }
    }
}

/// Resolve an optional landmark subset against the layout.
///
/// `None` selects every landmark in topology order.
pub fn resolve_landmarks(
    layout: FrameLayout,
    subset: Option<&[usize]>,
) -> AnalysisResult<Vec<usize>> {
    match subset {
        None => Ok((0..layout.landmarks).collect()),
        Some([]) => Err(AnalysisError::EmptyLandmarkSubset),
        Some(indices) => {
            if let Some(&index) = indices.iter().find(|&&i| i >= layout.landmarks) {
                return Err(AnalysisError::InvalidLandmarkIndex {
                    index,
                    landmarks: layout.landmarks,
                });
            }
            Ok(indices.to_vec())
        }
    }
}

/// Reduce a position series to one value per frame on `axis`.
///
/// # Errors
///
/// | Condition | Error |
/// |---|---|
/// | axis not captured | `AxisUnavailable` |
/// | subset given but empty | `EmptyLandmarkSubset` |
/// | index out of range | `InvalidLandmarkIndex` |
/// | fewer than 2 frames | `InsufficientFrames` |
pub fn reduce_axis(
    position: &FeatureSeries,
    layout: FrameLayout,
    axis: Axis,
    mode: ReduceMode,
    subset: Option<&[usize]>,
) -> AnalysisResult<Vec<f64>> {
    if axis.offset() >= layout.coords {
        return Err(AnalysisError::AxisUnavailable {
            axis,
            coords: layout.coords,
        });
    }
    let landmarks = resolve_landmarks(layout, subset)?;
    if position.len() < MIN_FRAMES {
        return Err(AnalysisError::InsufficientFrames {
            required: MIN_FRAMES,
            actual: position.len(),
        });
    }

    let offsets = landmarks
        .iter()
        .map(|&l| layout.offset(l, axis))
        .collect::<AnalysisResult<Vec<_>>>()?;
    let rows: Vec<Vec<f64>> = position
        .frames()
        .map(|frame| offsets.iter().map(|&o| frame[o]).collect())
        .collect();

    Ok(match mode {
        ReduceMode::Mean => rows.iter().map(|r| mean(r)).collect(),
        ReduceMode::Median => rows.into_iter().map(median).collect(),
        ReduceMode::Pca1 => first_component_projection(&rows, offsets.len()),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Project every frame onto the dominant eigenvector of the covariance.
///
/// The projection uses uncentred values, so a single signal projects onto
/// itself. The eigenvector's largest-magnitude component is made positive.
fn first_component_projection(rows: &[Vec<f64>], width: usize) -> Vec<f64> {
    if width == 1 {
        return rows.iter().map(|r| r[0]).collect();
    }

    let n = rows.len();
    let data = DMatrix::from_fn(n, width, |i, j| rows[i][j]);
    let means: Vec<f64> = (0..width).map(|j| data.column(j).mean()).collect();
    let centred = DMatrix::from_fn(n, width, |i, j| data[(i, j)] - means[j]);
    let covariance = (centred.transpose() * &centred) / (n as f64 - 1.0);

    let eigen = SymmetricEigen::new(covariance);
    let dominant = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > eigen.eigenvalues[best] { i } else { best });
    let mut axis: DVector<f64> = eigen.eigenvectors.column(dominant).into_owned();

    let peak = axis.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let pivot = axis
        .iter()
        .position(|v| (v.abs() - peak).abs() <= SIGN_TIE_TOLERANCE)
        .unwrap_or(0);
    if axis[pivot] < 0.0 {
        axis.neg_mut();
    }

    (data * axis).iter().copied().collect()
}
