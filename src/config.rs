//! Forecast and scoring configuration
//!
//! Loaded from JSON (every field optional) and validated once. The number of
//! sustainability scores is derived from `horizon / chunk_size` so the three
//! chunking constants can never disagree.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// Training seed used when the request does not pin one
pub const DEFAULT_TRAINING_SEED: u64 = 42;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of future samples extrapolated beyond the history
    pub horizon: usize,
    /// Future samples reduced into one sustainability score
    pub chunk_size: usize,
    pub rolling_window: usize,
    pub min_peak_spacing: usize,
    pub default_peak_spacing: f64,
    pub noise_level: f64,
    pub height_jitter: f64,
    /// Reserved row identifier, never treated as a mineral
    pub identifier_column: String,
    pub seed: Option<u64>,
    pub model: ModelConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 100,
            chunk_size: 4,
            rolling_window: 5,
            min_peak_spacing: 20,
            default_peak_spacing: 20.0,
            noise_level: 0.2,
            height_jitter: 0.2,
            identifier_column: "ID".to_string(),
            seed: None,
            model: ModelConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read forecast config: {:?}", path))?;

        let config: ForecastConfig = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse forecast config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.horizon == 0 {
            return Err(PipelineError::InvalidConfig("horizon must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.horizon % self.chunk_size != 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "horizon {} is not a multiple of chunk_size {}",
                self.horizon, self.chunk_size
            )));
        }
        if self.rolling_window == 0 {
            return Err(PipelineError::InvalidConfig("rolling_window must be positive".into()));
        }
        if !self.noise_level.is_finite() || self.noise_level < 0.0 {
            return Err(PipelineError::InvalidConfig("noise_level must be a non-negative number".into()));
        }
        if !self.height_jitter.is_finite() || self.height_jitter < 0.0 {
            return Err(PipelineError::InvalidConfig("height_jitter must be a non-negative number".into()));
        }
        if self.model.n_estimators == 0 {
            return Err(PipelineError::InvalidConfig("model.n_estimators must be positive".into()));
        }
        Ok(())
    }

    /// Number of sustainability scores (one per chunk of the horizon)
    pub fn num_scores(&self) -> usize {
        if self.chunk_size == 0 {
            0
        } else {
            self.horizon / self.chunk_size
        }
    }

    /// Seed for model training: pinned seed, else the fixed default
    pub fn training_seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_TRAINING_SEED)
    }
}

/// Regression strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    Linear,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::RandomForest,
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}
