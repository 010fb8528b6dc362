//! Errors raised while reading model exports.

use crate::repr::{LayoutError, TreeValidationError};

/// Error reading a model or ensemble export.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("invalid tree structure: {0:?}")]
    Structure(TreeValidationError),
    #[error("invalid model: {0}")]
    Validation(String),
}
