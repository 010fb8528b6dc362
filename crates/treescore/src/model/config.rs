//! Prediction configuration with builder pattern.
//!
//! # Example
//!
//! ```
//! use treescore::ensemble::CombineMethod;
//! use treescore::inference::MissingStrategy;
//! use treescore::model::PredictConfig;
//!
//! // All defaults
//! let config = PredictConfig::builder().build().unwrap();
//! assert_eq!(config.missing_strategy, MissingStrategy::LastPrediction);
//!
//! let config = PredictConfig::builder()
//!     .missing_strategy(MissingStrategy::Proportional)
//!     .combine_method(CombineMethod::ConfidenceWeighted)
//!     .z(2.58)
//!     .build()
//!     .unwrap();
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::ensemble::CombineMethod;
use crate::inference::{MissingStrategy, BINS_LIMIT, DEFAULT_Z};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The z-score must be positive and finite.
    InvalidZ(f64),
    /// The bin cap must be at least 1.
    InvalidBinsLimit,
    /// A threshold combination needs a threshold of at least 1.
    InvalidThreshold,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidZ(z) => write!(f, "z must be positive and finite, got {}", z),
            Self::InvalidBinsLimit => write!(f, "bins_limit must be at least 1"),
            Self::InvalidThreshold => write!(f, "threshold must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// PredictConfig
// =============================================================================

/// Options of a prediction call.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct PredictConfig {
    /// Handling of splits on missing fields. Default: `LastPrediction`.
    #[builder(default)]
    #[serde(default)]
    pub missing_strategy: MissingStrategy,

    /// How ensemble votes are combined. Default: `Plurality`.
    #[builder(default)]
    #[serde(default)]
    pub combine_method: CombineMethod,

    /// Z-score of confidence and error estimates. Default: 1.96.
    #[builder(default = DEFAULT_Z)]
    #[serde(default = "default_z")]
    pub z: f64,

    /// Bin cap of merged regression distributions. Default: 32.
    #[builder(default = BINS_LIMIT)]
    #[serde(default = "default_bins_limit")]
    pub bins_limit: usize,
}

fn default_z() -> f64 {
    DEFAULT_Z
}

fn default_bins_limit() -> usize {
    BINS_LIMIT
}

/// Custom finishing function that validates the config.
impl<S: predict_config_builder::IsComplete> PredictConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `z` is not positive, `bins_limit == 0`, or a
    /// threshold combination has a zero threshold.
    pub fn build(self) -> Result<PredictConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl PredictConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.z.is_finite() && self.z > 0.0) {
            return Err(ConfigError::InvalidZ(self.z));
        }
        if self.bins_limit == 0 {
            return Err(ConfigError::InvalidBinsLimit);
        }
        if let CombineMethod::Threshold { threshold: 0, .. } = self.combine_method {
            return Err(ConfigError::InvalidThreshold);
        }
        Ok(())
    }
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PredictConfig::builder().build().unwrap();
        assert_eq!(config.missing_strategy, MissingStrategy::LastPrediction);
        assert_eq!(config.combine_method, CombineMethod::Plurality);
        assert_eq!(config.z, DEFAULT_Z);
        assert_eq!(config.bins_limit, BINS_LIMIT);
    }

    #[test]
    fn test_invalid_z() {
        let result = PredictConfig::builder().z(0.0).build();
        assert!(matches!(result, Err(ConfigError::InvalidZ(_))));
        let result = PredictConfig::builder().z(f64::NAN).build();
        assert!(matches!(result, Err(ConfigError::InvalidZ(_))));
    }

    #[test]
    fn test_invalid_bins_limit() {
        let result = PredictConfig::builder().bins_limit(0).build();
        assert_eq!(result, Err(ConfigError::InvalidBinsLimit));
    }

    #[test]
    fn test_invalid_threshold() {
        let result = PredictConfig::builder()
            .combine_method(CombineMethod::Threshold {
                threshold: 0,
                category: "yes".into(),
            })
            .build();
        assert_eq!(result, Err(ConfigError::InvalidThreshold));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: PredictConfig =
            serde_json::from_str(r#"{"missing_strategy": "proportional"}"#).unwrap();
        assert_eq!(config.missing_strategy, MissingStrategy::Proportional);
        assert_eq!(config.bins_limit, BINS_LIMIT);
    }
}
