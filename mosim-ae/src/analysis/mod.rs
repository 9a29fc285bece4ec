//! Motion-similarity analysis engine
//!
//! Data flow for one recording:
//!
//! ```text
//! live + reference Sequence
//!   -> channels (position, amplitude, speed)
//!   -> dtw per channel
//!   -> similarity per channel + overall
//!   -> AnalysisSession
//! ```
//!
//! The reducer and sampler serve read-side views of stored sessions.

pub mod channels;
pub mod dtw;
pub mod engine;
pub mod normalize;
pub mod path;
pub mod reducer;
pub mod sampler;
pub mod series;
pub mod similarity;

pub use channels::{derive_channels, ChannelKind, ChannelSet, PerChannel};
pub use dtw::{BandConstraint, CostMatrix, Dtw, DtwResult, PointDistance};
pub use engine::{AnalysisEngine, AnalysisSession, ChannelOutcome, RecordingRequest, SessionSummary};
pub use normalize::{normalize_frame, Normalization};
pub use path::{WarpingPath, WarpingStep};
pub use reducer::{reduce_axis, ReduceMode};
pub use sampler::{sample_indices, Series};
pub use series::{FeatureSeries, FrameLayout};
pub use similarity::SimilarityScorer;
