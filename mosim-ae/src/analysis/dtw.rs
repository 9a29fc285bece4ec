//! Dynamic time warping between a live and a reference channel.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::path::{WarpingPath, WarpingStep};
use super::series::FeatureSeries;
use crate::error::{AnalysisError, AnalysisResult};

/// Constraint on the DTW warping window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandConstraint {
    /// Full cost matrix.
    #[default]
    Unconstrained,

    /// Sakoe-Chiba band around the length-scaled diagonal
    /// `j = i * (m - 1) / (n - 1)`.
    ///
    /// The radius is raised to `ceil(slope) / 2` when smaller, which keeps
    /// `(n-1, m-1)` reachable for any pair of lengths.
    SakoeChiba { radius: usize },

    /// Sakoe-Chiba band whose radius is a tenth of the reference length,
    /// at least 1.
    SakoeChibaAuto,
}

/// Divisor of the reference length for [`BandConstraint::SakoeChibaAuto`]
const AUTO_RADIUS_DIVISOR: usize = 10;

impl BandConstraint {
    fn slope(n: usize, m: usize) -> f64 {
        if n > 1 {
            (m - 1) as f64 / (n - 1) as f64
        } else {
            0.0
        }
    }

    fn effective_radius(radius: usize, n: usize, m: usize) -> usize {
        radius.max(Self::slope(n, m).ceil() as usize / 2)
    }

    /// Band radius for an `n x m` matrix; `None` means every column.
    fn radius(&self, n: usize, m: usize) -> Option<usize> {
        match *self {
            Self::Unconstrained => None,
            _ if n == 1 => None,
            Self::SakoeChiba { radius } => Some(Self::effective_radius(radius, n, m)),
            Self::SakoeChibaAuto => {
                let radius = (m / AUTO_RADIUS_DIVISOR).max(1);
                Some(Self::effective_radius(radius, n, m))
            }
        }
    }

    /// Valid column range of `row` in an `n x m` matrix.
    #[must_use]
    pub fn column_range(&self, row: usize, n: usize, m: usize) -> Range<usize> {
        match self.radius(n, m) {
            None => 0..m,
            Some(r) => {
                let centre = (row as f64 * Self::slope(n, m)).round() as usize;
                centre.saturating_sub(r)..(centre + r + 1).min(m)
            }
        }
    }

    /// Widest row of the band.
    #[must_use]
    pub fn band_width(&self, n: usize, m: usize) -> usize {
        match self.radius(n, m) {
            None => m,
            Some(r) => (2 * r + 1).min(m),
        }
    }
}

/// Pointwise distance between two frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointDistance {
    #[default]
    Euclidean,
    SquaredEuclidean,
    Manhattan,
}

impl PointDistance {
    #[must_use]
    pub fn between(self, a: &[f64], b: &[f64]) -> f64 {
        let pairs = a.iter().zip(b);
        match self {
            Self::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            Self::SquaredEuclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

/// Banded matrix of local costs `C[i][j]`.
///
/// Row `i` stores columns `ranges[i]` at `i * width + (j - ranges[i].start)`.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    width: usize,
    ranges: Vec<Range<usize>>,
    data: Vec<f64>,
}

impl CostMatrix {
    /// Local costs of every in-band cell.
    pub fn compute(
        live: &FeatureSeries,
        reference: &FeatureSeries,
        metric: PointDistance,
        constraint: BandConstraint,
    ) -> Self {
        let (n, m) = (live.len(), reference.len());
        let width = constraint.band_width(n, m);
        let ranges: Vec<_> = (0..n).map(|i| constraint.column_range(i, n, m)).collect();
        let mut data = vec![f64::INFINITY; n * width];

        for (i, range) in ranges.iter().enumerate() {
            let a = live.frame(i);
            for j in range.clone() {
                data[i * width + j - range.start] = metric.between(a, reference.frame(j));
            }
        }

        Self {
            rows: n,
            cols: m,
            width,
            ranges,
            data,
        }
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Flat index of `(i, j)`, or `None` outside the band.
    fn index(&self, i: usize, j: usize) -> Option<usize> {
        let range = &self.ranges[i];
        range.contains(&j).then(|| i * self.width + j - range.start)
    }

    /// Local cost at `(i, j)`; infinite outside the band.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.index(i, j).map_or(f64::INFINITY, |idx| self.data[idx])
    }
}

/// Alignment of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtwResult {
    /// Cumulative cost along the path, `D[n-1][m-1]`.
    pub distance: f64,
    /// `distance / path.len()`
    pub avg_step_cost: f64,
    pub path: WarpingPath,
    /// Local cost `C[i][j]` at each path node.
    pub step_costs: Vec<f64>,
    /// Running sum of `step_costs` divided by `distance`, ending at 1.
    pub cumulative_progress: Vec<f64>,
}

impl DtwResult {
    fn from_path(distance: f64, path: WarpingPath, step_costs: Vec<f64>) -> Self {
        let len = path.len();
        let cumulative_progress = if distance > 0.0 {
            let mut running = 0.0;
            step_costs
                .iter()
                .map(|c| {
                    running += c;
                    (running / distance).min(1.0)
                })
                .collect()
        } else {
            (1..=len).map(|k| k as f64 / len as f64).collect()
        };

        Self {
            distance,
            avg_step_cost: distance / len as f64,
            path,
            step_costs,
            cumulative_progress,
        }
    }

    /// For each live index, the last reference index on the path.
    #[must_use]
    pub fn alignment_map(&self) -> Vec<usize> {
        self.path.alignment_map()
    }
}

/// Immutable DTW configuration. Thread-safe and copyable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dtw {
    constraint: BandConstraint,
    metric: PointDistance,
}

impl Dtw {
    #[must_use]
    pub fn new(constraint: BandConstraint, metric: PointDistance) -> Self {
        Self { constraint, metric }
    }

    #[must_use]
    pub fn unconstrained() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sakoe_chiba(radius: usize) -> Self {
        Self::new(BandConstraint::SakoeChiba { radius }, PointDistance::Euclidean)
    }

    #[must_use]
    pub fn constraint(&self) -> BandConstraint {
        self.constraint
    }

    /// Align `live` (length n) to `reference` (length m).
    ///
    /// Ties between predecessors prefer diagonal, then up (advance live
    /// only), then left (advance reference only).
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |---|---|
    /// | either input has no frames | `EmptySequence` |
    /// | frame dimensions differ | `DimensionMismatch` |
    #[instrument(skip(self, live, reference), fields(n = live.len(), m = reference.len()))]
    pub fn align(
        &self,
        live: &FeatureSeries,
        reference: &FeatureSeries,
    ) -> AnalysisResult<DtwResult> {
        if live.is_empty() || reference.is_empty() {
            return Err(AnalysisError::EmptySequence);
        }
        if live.dim() != reference.dim() {
            return Err(AnalysisError::DimensionMismatch {
                live: live.dim(),
                reference: reference.dim(),
            });
        }

        let local = CostMatrix::compute(live, reference, self.metric, self.constraint);
        let (n, m) = local.shape();
        let mut acc = vec![f64::INFINITY; local.data.len()];
        // Direction bits: 0 = diagonal, 1 = up, 2 = left
        let mut dirs = vec![0u8; local.data.len()];
        let acc_at = |acc: &[f64], i: usize, j: usize| {
            local.index(i, j).map_or(f64::INFINITY, |idx| acc[idx])
        };

        for i in 0..n {
            for j in local.ranges[i].clone() {
                let idx = i * local.width + j - local.ranges[i].start;
                let c = local.data[idx];

                if i == 0 && j == 0 {
                    acc[idx] = c;
                    continue;
                }

                let diag = if i > 0 && j > 0 {
                    acc_at(&acc, i - 1, j - 1)
                } else {
                    f64::INFINITY
                };
                let up = if i > 0 {
                    acc_at(&acc, i - 1, j)
                } else {
                    f64::INFINITY
                };
                let left = if j > 0 {
                    acc_at(&acc, i, j - 1)
                } else {
                    f64::INFINITY
                };

                let (min_val, dir) = if diag <= up && diag <= left {
                    (diag, 0u8)
                } else if up <= left {
                    (up, 1u8)
                } else {
                    (left, 2u8)
                };

                acc[idx] = c + min_val;
                dirs[idx] = dir;
            }
        }

        let (mut i, mut j) = (n - 1, m - 1);
        let end = local.index(i, j).ok_or(AnalysisError::EmptySequence)?;
        let distance = acc[end];

        let mut steps = Vec::with_capacity(n + m - 1);
        let mut step_costs = Vec::with_capacity(n + m - 1);
        loop {
            steps.push(WarpingStep { live: i, reference: j });
            step_costs.push(local.get(i, j));
            if i == 0 && j == 0 {
                break;
            }
            let idx = i * local.width + j - local.ranges[i].start;
            match dirs[idx] {
                0 => {
                    i -= 1;
                    j -= 1;
                }
                1 => i -= 1,
                _ => j -= 1,
            }
        }
        steps.reverse();
        step_costs.reverse();

        Ok(DtwResult::from_path(
            distance,
            WarpingPath::new(steps),
            step_costs,
        ))
    }
}
