//! Kinematic channel derivation
//!
//! Every sequence yields three channels computed once and compared
//! independently:
//!
//! - **position**: the flattened landmark vector `[x0, y0, (z0), x1, ...]`
//!   of each frame, after optional normalisation.
//! - **speed**: per-axis first difference of position, per frame index.
//!   `speed[0]` is all zeros. Capture frame rate is not taken into account.
//! - **amplitude**: per frame, the mean Euclidean distance of the landmarks
//!   from the centroid of the sequence's first frame.

use std::fmt;
use std::str::FromStr;

use mosim_common::Sequence;
use serde::{Deserialize, Serialize};

use super::normalize::{centroid, euclidean, normalize_frame, Normalization};
use super::series::{FeatureSeries, FrameLayout};
use crate::error::{AnalysisError, AnalysisResult};

/// Frames needed before speed and amplitude are defined
pub const MIN_FRAMES: usize = 2;

/// Derived signal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Position,
    Amplitude,
    Speed,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Position,
        ChannelKind::Amplitude,
        ChannelKind::Speed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Position => "position",
            ChannelKind::Amplitude => "amplitude",
            ChannelKind::Speed => "speed",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = mosim_common::Error;

    fn from_str(s: &str) -> mosim_common::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" => Ok(ChannelKind::Position),
            "amplitude" => Ok(ChannelKind::Amplitude),
            "speed" => Ok(ChannelKind::Speed),
            other => Err(mosim_common::Error::InvalidInput(format!(
                "Unknown channel '{}' (expected position, amplitude or speed)",
                other
            ))),
        }
    }
}

/// One value per channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerChannel<T> {
    pub position: T,
    pub amplitude: T,
    pub speed: T,
}

impl<T> PerChannel<T> {
    pub fn get(&self, kind: ChannelKind) -> &T {
        match kind {
            ChannelKind::Position => &self.position,
            ChannelKind::Amplitude => &self.amplitude,
            ChannelKind::Speed => &self.speed,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerChannel<U> {
        PerChannel {
            position: f(&self.position),
            amplitude: f(&self.amplitude),
            speed: f(&self.speed),
        }
    }

    /// Build from a fallible per-kind constructor, in `ChannelKind::ALL` order
    pub fn try_build<E>(mut f: impl FnMut(ChannelKind) -> Result<T, E>) -> Result<Self, E> {
        Ok(PerChannel {
            position: f(ChannelKind::Position)?,
            amplitude: f(ChannelKind::Amplitude)?,
            speed: f(ChannelKind::Speed)?,
        })
    }
}

/// The three channels of one sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSet {
    pub layout: FrameLayout,
    pub series: PerChannel<FeatureSeries>,
}

impl ChannelSet {
    pub fn get(&self, kind: ChannelKind) -> &FeatureSeries {
        self.series.get(kind)
    }

    /// Frame count, identical for every channel
    pub fn len(&self) -> usize {
        self.series.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.position.is_empty()
    }
}

/// Derive position, amplitude and speed for a sequence.
///
/// # Errors
///
/// - `InsufficientFrames` for fewer than [`MIN_FRAMES`] frames
/// - `EmptySequence` when frames carry no landmarks
/// - `InconsistentFrame` when the landmark count changes mid-sequence
/// - `NonFiniteValue` for NaN or infinite coordinates
/// - `InvalidLandmarkIndex` when anatomical normalisation lacks an anchor
pub fn derive_channels(
    sequence: &Sequence,
    normalization: Normalization,
) -> AnalysisResult<ChannelSet> {
    let (position, layout) = position_trace(sequence, normalization)?;
    let amplitude = amplitude_of(&position, layout)?;
    let speed = speed_of(&position)?;

    Ok(ChannelSet {
        layout,
        series: PerChannel {
            position,
            amplitude,
            speed,
        },
    })
}

/// Validate and flatten a sequence into its position channel
pub fn position_trace(
    sequence: &Sequence,
    normalization: Normalization,
) -> AnalysisResult<(FeatureSeries, FrameLayout)> {
    if sequence.len() < MIN_FRAMES {
        return Err(AnalysisError::InsufficientFrames {
            required: MIN_FRAMES,
            actual: sequence.len(),
        });
    }
    let layout = FrameLayout::of(sequence);
    if layout.landmarks == 0 {
        return Err(AnalysisError::EmptySequence);
    }
    if let Some((frame, actual)) = sequence.first_inconsistent_frame() {
        return Err(AnalysisError::InconsistentFrame {
            frame,
            expected: layout.landmarks,
            actual,
        });
    }

    let dim = layout.dim();
    let mut data = Vec::with_capacity(sequence.len() * dim);
    for (index, frame) in sequence.frames.iter().enumerate() {
        let start = data.len();
        for landmark in &frame.landmarks {
            data.push(landmark.x);
            data.push(landmark.y);
            if layout.coords == 3 {
                data.push(landmark.z.unwrap_or(0.0));
            }
        }
        if data[start..].iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::NonFiniteValue { frame: index });
        }
        if normalization == Normalization::Anatomical {
            normalize_frame(&mut data[start..], layout, sequence.model)?;
        }
    }

    let position = FeatureSeries::new(dim, data).map_err(overflow_in(ChannelKind::Position))?;
    Ok((position, layout))
}

/// Input is finite by now, so a non-finite channel value is an overflow
fn overflow_in(channel: ChannelKind) -> impl Fn(AnalysisError) -> AnalysisError {
    move |err| match err {
        AnalysisError::NonFiniteValue { frame } => AnalysisError::DerivedOverflow { channel, frame },
        other => other,
    }
}

fn speed_of(position: &FeatureSeries) -> AnalysisResult<FeatureSeries> {
    let dim = position.dim();
    let mut data = vec![0.0; dim];
    data.reserve(position.len().saturating_sub(1) * dim);
    for t in 1..position.len() {
        let (prev, cur) = (position.frame(t - 1), position.frame(t));
        data.extend(cur.iter().zip(prev).map(|(c, p)| c - p));
    }
    FeatureSeries::new(dim, data).map_err(overflow_in(ChannelKind::Speed))
}

fn amplitude_of(position: &FeatureSeries, layout: FrameLayout) -> AnalysisResult<FeatureSeries> {
    let anchor = centroid(position.frame(0), layout);
    let values = position
        .frames()
        .map(|frame| {
            let total: f64 = frame
                .chunks_exact(layout.coords)
                .map(|landmark| euclidean(landmark, &anchor))
                .sum();
            total / layout.landmarks as f64
        })
        .collect();
    FeatureSeries::from_scalars(values).map_err(overflow_in(ChannelKind::Amplitude))
}
