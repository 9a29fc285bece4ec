//! Uniform-stride downsampling for transport and charting
//!
//! Points are picked, never averaged, so isolated cost spikes survive.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// Smallest budget that can hold both endpoints
pub const MIN_POINT_BUDGET: usize = 2;

/// Indices kept when reducing `len` points to at most `max_points`.
///
/// Stride is `ceil(len / max_points)`. The first and last index are always
/// kept; if appending the last index would exceed the budget it replaces
/// the final stride pick instead.
///
/// # Errors
///
/// `InvalidPointBudget` when `max_points < 2`.
pub fn sample_indices(len: usize, max_points: usize) -> AnalysisResult<Vec<usize>> {
    if max_points < MIN_POINT_BUDGET {
        return Err(AnalysisError::InvalidPointBudget(max_points));
    }
    if len <= max_points {
        return Ok((0..len).collect());
    }

    let stride = len.div_ceil(max_points);
    let mut indices: Vec<usize> = (0..len).step_by(stride).collect();
    let last = len - 1;
    if indices.last() != Some(&last) {
        if indices.len() < max_points {
            indices.push(last);
        } else if let Some(tail) = indices.last_mut() {
            *tail = last;
        }
    }
    Ok(indices)
}

/// An `(x, y)` series as parallel arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    /// Series indexed by position: `x = 0, 1, 2, ...`
    pub fn indexed<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let y: Vec<f64> = values.into_iter().collect();
        let x = (0..y.len()).map(|i| i as f64).collect();
        Self { x, y }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// At most `max_points` points; unchanged when already small enough.
    pub fn downsample(&self, max_points: usize) -> AnalysisResult<Series> {
        let indices = sample_indices(self.len(), max_points)?;
        Ok(Series {
            x: pick(&self.x, &indices),
            y: pick(&self.y, &indices),
        })
    }
}

/// Values at `indices`
pub fn pick<T: Copy>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i]).collect()
}
