/*!
Pipeline configuration
*/
use crate::data::{scale::DegeneratePolicy, window::SplitSpec};
use crate::train::TrainConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// The longest step between rows, in days
pub const MAX_STEP_DAYS: i64 = 36_525;

/// The shape of the recurrent regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hidden size of every LSTM layer
    pub hidden: usize,
    /// Number of stacked LSTM layers
    pub layers: usize,
    /// Dropout between LSTM layers and before the output projection
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> ModelConfig {
        ModelConfig {
            hidden: 128,
            layers: 1,
            dropout: 0.5,
        }
    }
}

/// Everything a [`crate::pipeline::run`] needs to know, passed explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows of context per prediction
    pub lookback: usize,
    /// Model shape
    pub model: ModelConfig,
    /// Optimizer and training loop settings
    pub train: TrainConfig,
    /// How the series is cut into train, validation and test ranges
    pub split: SplitSpec,
    /// What to do with constant features
    pub degenerate: DegeneratePolicy,
    /// Days between consecutive rows, used to date forecasts when no dates are given
    pub step_days: i64,
    /// Run on an accelerator if one is available
    pub use_accelerator: bool,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            lookback: 5,
            model: ModelConfig::default(),
            train: TrainConfig::default(),
            split: SplitSpec::default(),
            degenerate: DegeneratePolicy::default(),
            step_days: 1,
            use_accelerator: false,
        }
    }
}

impl PipelineConfig {
    /// Read a configuration from JSON; missing fields take their defaults
    pub fn from_reader<R: Read>(rdr: R) -> Result<PipelineConfig> {
        let config: PipelineConfig = serde_json::from_reader(rdr)?;
        config.validate()?;
        Ok(config)
    }
    /// Check every value is in range
    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            return Err(Error::InvalidConfig("lookback must be at least one".into()));
        }
        if self.model.hidden == 0 || self.model.layers == 0 {
            return Err(Error::InvalidConfig(format!(
                "a model needs at least one layer of at least one unit, got {} x {}",
                self.model.layers, self.model.hidden
            )));
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout {} must be in [0, 1)",
                self.model.dropout
            )));
        }
        if !(1..=MAX_STEP_DAYS).contains(&self.step_days) {
            return Err(Error::InvalidConfig(format!(
                "step of {} days must be between 1 and {}",
                self.step_days, MAX_STEP_DAYS
            )));
        }
        self.train.validate()
    }
}
