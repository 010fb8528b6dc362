//! High-level model types.
//!
//! - [`TreeModel`]: one decision tree with its field table
//! - [`Ensemble`]: ordered tree models combined by vote
//! - [`PredictConfig`]: per-call options, built with validation

mod config;
mod ensemble;
mod tree_model;

pub use config::{ConfigError, PredictConfig, PredictConfigBuilder};
pub use ensemble::{Ensemble, ModelError};
pub use tree_model::{BoostingInfo, TreeModel};
