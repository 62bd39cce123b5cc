//! Loader configuration.
//!
//! # TOML Structure
//!
//! ```toml
//! batch_size = 64
//! shuffle = true
//! device = "cpu"
//! debug = false
//! split = "train"
//! drop_last = false
//! seed = 42
//! parallel = true
//! ```
//!
//! Every key is optional; missing keys take the [`LoaderConfig::default`] value. The
//! `MOLGEN_DEBUG` environment variable can force debug mode, see
//! [`LoaderConfig::with_env_overrides`].

use crate::tensor::Device;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of samples kept when `debug` is set.
pub const DEBUG_SUBSET: usize = 129;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Dataset split a loader reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Train,
    Valid,
    Test,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

/// Options recognized by [`GenLoader`](crate::data::GenLoader) and
/// [`EvaluationLoader`](crate::data::EvaluationLoader).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Samples per batch.
    pub batch_size: usize,
    /// Reshuffle the sample order every epoch.
    pub shuffle: bool,
    /// Placement target for batch tensors.
    pub device: Device,
    /// Truncate the dataset to [`DEBUG_SUBSET`] samples.
    pub debug: bool,
    pub split: Split,
    /// Drop a trailing batch smaller than `batch_size`.
    pub drop_last: bool,
    /// Seed for sample order and prior noise. `None` draws from the thread RNG.
    pub seed: Option<u64>,
    /// Apply per-sample transforms of a batch on the rayon pool.
    pub parallel: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            device: Device::Cpu,
            debug: false,
            split: Split::Train,
            drop_last: false,
            seed: None,
            parallel: false,
        }
    }
}

impl LoaderConfig {
    /// Loads and validates a TOML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.as_ref().display(), "loaded loader config");
        Ok(config)
    }

    /// Parses and validates a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".into()));
        }
        Ok(())
    }

    /// Applies environment overrides: `MOLGEN_DEBUG=1|true` enables debug mode.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("MOLGEN_DEBUG") {
            if parse_flag(&value) {
                self.debug = true;
            }
        }
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
