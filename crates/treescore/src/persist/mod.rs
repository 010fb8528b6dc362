//! Reading model exports.
//!
//! Exports are JSON documents described by the [`schema`] types. Loading
//! parses the schema, then converts it into the runtime model, validating
//! predicates, node statistics and tree structure on the way.
//!
//! ```
//! use treescore::model::TreeModel;
//!
//! let model = TreeModel::from_json_str(r#"{
//!     "objective_field": "y",
//!     "model": {
//!         "fields": {"y": {"optype": "categorical"}},
//!         "root": {"id": 0, "predicate": true, "output": "yes", "count": 2,
//!                  "objective_summary": {"categories": [["yes", 2]]}}
//!     }
//! }"#).unwrap();
//! assert_eq!(model.tree().n_nodes(), 1);
//! ```

mod convert;
mod error;
pub mod schema;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::model::{Ensemble, TreeModel};

pub use error::ReadError;
use schema::{EnsembleSchema, ModelSchema};

impl TreeModel {
    /// Parse a single-tree export.
    pub fn from_json_str(json: &str) -> Result<Self, ReadError> {
        let schema: ModelSchema = serde_json::from_str(json)?;
        Self::from_schema(schema)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReadError> {
        let schema: ModelSchema = serde_json::from_reader(reader)?;
        Self::from_schema(schema)
    }

    /// Load a single-tree export from a file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    fn from_schema(schema: ModelSchema) -> Result<Self, ReadError> {
        let model = Self::try_from(schema)?;
        debug!(
            variant = %model.variant(),
            nodes = model.tree().n_nodes(),
            leaves = model.tree().n_leaves(),
            fields = model.fields().len(),
            "loaded tree model"
        );
        Ok(model)
    }
}

impl Ensemble {
    /// Parse an ensemble export.
    pub fn from_json_str(json: &str) -> Result<Self, ReadError> {
        let schema: EnsembleSchema = serde_json::from_str(json)?;
        Self::from_schema(schema)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReadError> {
        let schema: EnsembleSchema = serde_json::from_reader(reader)?;
        Self::from_schema(schema)
    }

    /// Load an ensemble export from a file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    fn from_schema(schema: EnsembleSchema) -> Result<Self, ReadError> {
        let ensemble = Self::try_from(schema)?;
        debug!(
            models = ensemble.len(),
            boosted = ensemble.is_boosted(),
            "loaded ensemble"
        );
        Ok(ensemble)
    }
}
