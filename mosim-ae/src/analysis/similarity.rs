//! Mapping DTW costs to bounded similarity scores

use mosim_common::{Error, Result};

use super::channels::{ChannelKind, PerChannel};

/// Default decay constants; speed values are an order of magnitude smaller
/// than positions, so their decay is steeper.
pub const DEFAULT_DECAY: PerChannel<f64> = PerChannel {
    position: 5.0,
    amplitude: 10.0,
    speed: 25.0,
};

/// Equal weighting of the three channels
pub const DEFAULT_WEIGHTS: PerChannel<f64> = PerChannel {
    position: 1.0,
    amplitude: 1.0,
    speed: 1.0,
};

/// `similarity = exp(-λ · avg_step_cost)`, per channel, plus a weighted
/// mean across channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScorer {
    decay: PerChannel<f64>,
    weights: PerChannel<f64>,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self {
            decay: DEFAULT_DECAY,
            weights: DEFAULT_WEIGHTS,
        }
    }
}

impl SimilarityScorer {
    /// Validate and build a scorer.
    ///
    /// Every λ must be finite and positive; weights must be finite,
    /// non-negative and not all zero.
    pub fn new(decay: PerChannel<f64>, weights: PerChannel<f64>) -> Result<Self> {
        for kind in ChannelKind::ALL {
            let lambda = *decay.get(kind);
            if !lambda.is_finite() || lambda <= 0.0 {
                return Err(Error::Config(format!(
                    "decay for {} must be finite and positive, got {}",
                    kind, lambda
                )));
            }
            let weight = *weights.get(kind);
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Config(format!(
                    "weight for {} must be finite and non-negative, got {}",
                    kind, weight
                )));
            }
        }
        if weights.position + weights.amplitude + weights.speed <= 0.0 {
            return Err(Error::Config("channel weights must not all be zero".to_string()));
        }
        Ok(Self { decay, weights })
    }

    pub fn decay(&self) -> &PerChannel<f64> {
        &self.decay
    }

    pub fn weights(&self) -> &PerChannel<f64> {
        &self.weights
    }

    /// Score in `(0, 1]`; 1 exactly when the average step cost is 0.
    ///
    /// Underflow is clamped to the smallest positive `f64`, so a score is
    /// never 0.
    pub fn similarity(&self, kind: ChannelKind, avg_step_cost: f64) -> f64 {
        (-self.decay.get(kind) * avg_step_cost)
            .exp()
            .clamp(f64::MIN_POSITIVE, 1.0)
    }

    /// Weighted mean of per-channel similarities.
    pub fn overall(&self, similarities: &PerChannel<f64>) -> f64 {
        let total = self.weights.position + self.weights.amplitude + self.weights.speed;
        ChannelKind::ALL
            .iter()
            .map(|&k| self.weights.get(k) * similarities.get(k))
            .sum::<f64>()
            / total
    }
}
