//! Service configuration for mosim-ae
//!
//! Read once at startup from `mosim-ae.toml`. Every key has a default, so a
//! missing file starts the service with the built-in engine settings.
//!
//! ```toml
//! root_folder = "/srv/mosim"
//! bind_address = "127.0.0.1"
//! port = 5731
//!
//! [logging]
//! level = "info"
//!
//! [engine]
//! band_radius = 40        # or "auto": a tenth of the reference length
//! normalization = "anatomical"
//! analysis_timeout_secs = 120
//!
//! [engine.decay]
//! position = 5.0
//! amplitude = 10.0
//! speed = 25.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use mosim_common::config::{config_file_path, load_toml_file, LoggingConfig};
use mosim_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::similarity::{DEFAULT_DECAY, DEFAULT_WEIGHTS};
use crate::analysis::{BandConstraint, Dtw, Normalization, PerChannel, PointDistance, SimilarityScorer};

/// Config file name under `~/.config/mosim/`
pub const CONFIG_FILE_NAME: &str = "mosim-ae.toml";

/// Default listen port
pub const DEFAULT_PORT: u16 = 5731;

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: DEFAULT_PORT,
            logging: LoggingConfig::default(),
            engine: EngineSettings::default(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Sakoe-Chiba radius setting: a frame count or `"auto"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BandRadius {
    Fixed(usize),
    Auto(AutoRadius),
}

/// The `"auto"` keyword of [`BandRadius`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoRadius {
    Auto,
}

/// Analysis engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Sakoe-Chiba radius; absent runs unconstrained DTW
    #[serde(default)]
    pub band_radius: Option<BandRadius>,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default)]
    pub metric: PointDistance,
    /// Per-channel decay constant λ
    #[serde(default = "default_decay")]
    pub decay: PerChannel<f64>,
    /// Per-channel weight in the overall score
    #[serde(default = "default_weights")]
    pub weights: PerChannel<f64>,
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            band_radius: None,
            normalization: Normalization::None,
            metric: PointDistance::Euclidean,
            decay: DEFAULT_DECAY,
            weights: DEFAULT_WEIGHTS,
            analysis_timeout_secs: default_analysis_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_decay() -> PerChannel<f64> {
    DEFAULT_DECAY
}

fn default_weights() -> PerChannel<f64> {
    DEFAULT_WEIGHTS
}

fn default_analysis_timeout_secs() -> u64 {
    120
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

impl EngineSettings {
    pub fn dtw(&self) -> Dtw {
        let constraint = match self.band_radius {
            Some(BandRadius::Fixed(radius)) => BandConstraint::SakoeChiba { radius },
            Some(BandRadius::Auto(_)) => BandConstraint::SakoeChibaAuto,
            None => BandConstraint::Unconstrained,
        };
        Dtw::new(constraint, self.metric)
    }

    pub fn scorer(&self) -> Result<SimilarityScorer> {
        SimilarityScorer::new(self.decay, self.weights)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        self.scorer()?;
        if self.analysis_timeout_secs == 0 {
            return Err(Error::Config(
                "engine.analysis_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::Config("engine.max_body_bytes must be positive".to_string()));
        }
        Ok(())
    }
}

/// Locate, parse and validate the service config
pub fn load(cli_config: Option<&Path>) -> Result<ServiceConfig> {
    let path = config_file_path(cli_config, CONFIG_FILE_NAME);
    let config: ServiceConfig = load_toml_file(path.as_deref())?;
    config.engine.validate()?;
    Ok(config)
}
