//! treescore: local scoring of exported decision-tree models.
//!
//! Scores input records against single trees (classification, regression,
//! their weighted forms and boosted trees) and against ensembles, without
//! any remote service.
//!
//! # Key Types
//!
//! - [`TreeModel`] / [`Ensemble`] - Loaded models with predict methods
//! - [`PredictConfig`] - Missing strategy, combination method and estimator options
//! - [`Prediction`] - Output, confidence, distribution and path of one record
//! - [`CompactTree`] - Breadth-first arena with per-variant record layouts
//!
//! # Loading Models
//!
//! Use [`TreeModel::load_json`] or [`Ensemble::load_json`] to read a JSON
//! export. See the [`persist`] module for the format.
//!
//! # Missing Values
//!
//! [`MissingStrategy::LastPrediction`] stops at the last node a record
//! reaches; [`MissingStrategy::Proportional`] follows every branch of an
//! undecidable split and merges what it reaches.

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod ensemble;
pub mod inference;
pub mod model;
pub mod persist;
pub mod repr;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// High-level model types
pub use model::{Ensemble, ModelError, PredictConfig, TreeModel};

// Prediction results and options
pub use ensemble::{CombineMethod, MultiVote};
pub use inference::{MissingStrategy, Output, Prediction};

// Representation
pub use repr::{CompactTree, Fields, InputRecord, TreeVariant, Value};

// Loading
pub use persist::ReadError;

// Shared utilities
pub use utils::{run_with_threads, Parallelism};
