//! # MOSIM Common Library
//!
//! Shared code for the motion-similarity services including:
//! - Landmark, sequence and test-type domain model
//! - Configuration loading and root folder resolution
//! - SQLite pool initialization
//! - Timestamp and session identifier utilities

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{
    Axis, Landmark, LandmarkFrame, Sequence, SequenceRole, TestType, TrackingModel,
};
