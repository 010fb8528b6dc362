//! Prediction over compact trees.
//!
//! - [`traversal`]: the LAST_PREDICTION and PROPORTIONAL walks
//! - [`stats`]: distribution merging and confidence estimators
//! - [`text`]: term and item occurrence counting for text/items splits
//! - [`prediction`]: the [`Prediction`] result type

pub mod prediction;
pub mod stats;
pub mod text;
pub mod traversal;

pub use prediction::{Distribution, Output, Prediction};
pub use stats::{
    dist_median, merge_bins, merge_distributions, regression_error, ws_confidence,
    ws_confidence_with_n, DistributionKey, BINS_LIMIT, DEFAULT_Z,
};
pub use traversal::{one_branch, predict, MissingStrategy, Traversal, DEFAULT_LAMBDA};
