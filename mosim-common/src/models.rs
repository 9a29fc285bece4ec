//! Landmark and sequence domain model
//!
//! Recordings arrive as ordered lists of landmark frames produced by the
//! upstream tracking pipeline. The types here carry no analysis logic; they
//! only describe the data and the invariants the analysis engine relies on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single tracked point with 2D or 3D coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Tracker confidence, carried through but not used for scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new_2d(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
        }
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z: Some(z),
            visibility: None,
        }
    }

    /// Coordinate along `axis`; `z` reads as 0.0 when absent
    pub fn coord(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z.unwrap_or(0.0),
        }
    }
}

/// All landmarks captured at one instant, in tracking-model order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    pub landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Build a frame from `(x, y)` pairs
    pub fn from_xy(points: &[(f64, f64)]) -> Self {
        Self::new(points.iter().map(|&(x, y)| Landmark::new_2d(x, y)).collect())
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// True when every landmark in the frame carries a `z` coordinate
    pub fn has_z(&self) -> bool {
        !self.landmarks.is_empty() && self.landmarks.iter().all(|l| l.z.is_some())
    }
}

/// Which side of a comparison a sequence belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceRole {
    Live,
    Reference,
}

/// Landmark topology emitted by the tracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingModel {
    /// 21-point hand topology
    Hands,
    /// 33-point body topology
    Pose,
    /// Any other fixed topology
    #[default]
    Generic,
}

impl TrackingModel {
    /// Landmark count fixed by the topology, if any
    pub fn landmark_count(self) -> Option<usize> {
        match self {
            TrackingModel::Hands => Some(21),
            TrackingModel::Pose => Some(33),
            TrackingModel::Generic => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackingModel::Hands => "hands",
            TrackingModel::Pose => "pose",
            TrackingModel::Generic => "generic",
        }
    }
}

impl fmt::Display for TrackingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinate axis selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Offset of this axis inside one landmark's flattened coordinates
    pub fn offset(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            other => Err(Error::InvalidInput(format!(
                "Unknown axis '{}' (expected x, y or z)",
                other
            ))),
        }
    }
}

/// Canonical exercise names with a stored reference performance
pub const CANONICAL_TEST_TYPES: [&str; 3] = ["stand-and-sit", "finger-tapping", "fist-open-close"];

/// Spellings seen from clients, keyed after character normalization
const TEST_TYPE_ALIASES: &[(&str, &str)] = &[
    ("stand-sit", "stand-and-sit"),
    ("stand-to-sit", "stand-and-sit"),
    ("stand-and-sit-assessment", "stand-and-sit"),
    ("stand-and-sit-test", "stand-and-sit"),
    ("stand-and-sit-evaluation", "stand-and-sit"),
    ("finger-taping", "finger-tapping"),
    ("finger-tap", "finger-tapping"),
    ("finger-tapping-test", "finger-tapping"),
    ("finger-tapping-assessment", "finger-tapping"),
    ("fist-open-close-test", "fist-open-close"),
    ("fist-open-close-assessment", "fist-open-close"),
];

/// Normalized exercise identifier
///
/// Client spellings are folded to a canonical form (`"Stand & Sit"` and
/// `"stand_sit"` both become `stand-and-sit`). Unknown names are kept in
/// normalized form; they are never remapped to some other exercise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestType(String);

impl TestType {
    /// Normalize a raw client-provided test name
    pub fn parse(raw: &str) -> Result<Self> {
        let mut name = raw
            .trim()
            .to_lowercase()
            .replace([' ', '_'], "-")
            .replace('&', "and");
        while name.contains("--") {
            name = name.replace("--", "-");
        }
        let name = name.trim_matches('-').to_string();

        if name.is_empty() {
            return Err(Error::InvalidInput("Test type must not be empty".to_string()));
        }
        if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(Error::InvalidInput(format!(
                "Test type '{}' contains unsupported characters",
                raw
            )));
        }

        let canonical = TEST_TYPE_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(name);

        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for one of the exercises shipped with a reference template
    pub fn is_canonical(&self) -> bool {
        CANONICAL_TEST_TYPES.contains(&self.0.as_str())
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TestType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TestType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TestType> for String {
    fn from(value: TestType) -> Self {
        value.0
    }
}

/// Ordered, time-indexed recording of one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub role: SequenceRole,
    pub test_type: TestType,
    #[serde(default)]
    pub model: TrackingModel,
    pub frames: Vec<LandmarkFrame>,
}

impl Sequence {
    pub fn new(
        role: SequenceRole,
        test_type: TestType,
        model: TrackingModel,
        frames: Vec<LandmarkFrame>,
    ) -> Self {
        Self {
            role,
            test_type,
            model,
            frames,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Landmark count of the first frame (the topology for the whole sequence)
    pub fn landmark_count(&self) -> usize {
        self.frames.first().map(LandmarkFrame::len).unwrap_or(0)
    }

    /// 3 when every landmark of every frame has `z`, otherwise 2
    pub fn coords_per_landmark(&self) -> usize {
        if !self.frames.is_empty() && self.frames.iter().all(LandmarkFrame::has_z) {
            3
        } else {
            2
        }
    }

    /// First frame whose landmark count differs from frame 0: `(frame, count)`
    pub fn first_inconsistent_frame(&self) -> Option<(usize, usize)> {
        let expected = self.landmark_count();
        self.frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.len() != expected)
            .map(|(index, frame)| (index, frame.len()))
    }
}
