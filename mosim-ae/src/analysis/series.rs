//! Frame-major feature storage shared by every analysis stage.

use mosim_common::{Axis, Sequence};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// Shape of one flattened frame: `landmarks` points of `coords` values each.
///
/// The flattened order is `[x0, y0, (z0), x1, y1, (z1), ...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub landmarks: usize,
    pub coords: usize,
}

impl FrameLayout {
    /// Layout of a sequence, taken from its first frame.
    #[must_use]
    pub fn of(sequence: &Sequence) -> Self {
        Self {
            landmarks: sequence.landmark_count(),
            coords: sequence.coords_per_landmark(),
        }
    }

    /// Values per flattened frame.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.landmarks * self.coords
    }

    /// Offset of `(landmark, axis)` inside a flattened frame.
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |---|---|
    /// | `landmark >= landmarks` | `InvalidLandmarkIndex` |
    /// | axis not captured | `AxisUnavailable` |
    pub fn offset(&self, landmark: usize, axis: Axis) -> AnalysisResult<usize> {
        if landmark >= self.landmarks {
            return Err(AnalysisError::InvalidLandmarkIndex {
                index: landmark,
                landmarks: self.landmarks,
            });
        }
        if axis.offset() >= self.coords {
            return Err(AnalysisError::AxisUnavailable {
                axis,
                coords: self.coords,
            });
        }
        Ok(landmark * self.coords + axis.offset())
    }
}

/// A time series of fixed-dimension vectors stored contiguously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSeries {
    dim: usize,
    data: Vec<f64>,
}

impl FeatureSeries {
    /// Wrap frame-major `data` whose frames are `dim` values wide.
    ///
    /// # Errors
    ///
    /// `NonFiniteValue` for the first frame holding NaN or infinity, and
    /// `DimensionMismatch` when `data` is not a whole number of frames.
    pub fn new(dim: usize, data: Vec<f64>) -> AnalysisResult<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(AnalysisError::DimensionMismatch {
                live: data.len(),
                reference: dim,
            });
        }
        if let Some(index) = data.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::NonFiniteValue { frame: index / dim });
        }
        Ok(Self { dim, data })
    }

    /// One-dimensional series.
    pub fn from_scalars(values: Vec<f64>) -> AnalysisResult<Self> {
        Self::new(1, values)
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Values per frame.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Frame `i` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    #[must_use]
    pub fn frame(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn frames(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.dim)
    }

    /// Value at `offset` of every frame.
    #[must_use]
    pub fn column(&self, offset: usize) -> Vec<f64> {
        self.frames().map(|f| f[offset]).collect()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}
