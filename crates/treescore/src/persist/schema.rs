//! Schema types of the JSON model export.
//!
//! These mirror the export layout and are kept separate from the runtime
//! types in [`crate::repr`]; [`super::convert`] validates and converts them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use serde_with::{serde_as, DefaultOnNull};

use crate::ensemble::InitialOffset;
use crate::repr::{ItemAnalysis, Optype, TermAnalysis};

/// A single-tree model export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Id of the field the model predicts.
    pub objective_field: String,
    /// Present for members of a boosted ensemble.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boosting: Option<BoostingSchema>,
    pub model: TreeSchema,
}

/// Tree and field table of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSchema {
    pub root: NodeSchema,
    pub fields: HashMap<String, FieldSchema>,
}

/// Boosting attributes of one boosted tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingSchema {
    /// L2 regularization of leaf outputs.
    pub lambda: f64,
    /// Weight of the tree's iteration.
    pub weight: f64,
    /// Class scored by the tree (classification ensembles).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective_class: Option<String>,
}

impl Default for BoostingSchema {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            weight: 1.0,
            objective_class: None,
        }
    }
}

/// An ensemble export: member models in vote order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleSchema {
    pub models: Vec<ModelSchema>,
    /// Initial score of a boosted ensemble.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_offset: Option<InitialOffset>,
}

// =============================================================================
// Fields
// =============================================================================

/// Descriptor of one input field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub optype: Optype,
    #[serde(default)]
    pub summary: FieldSummarySchema,
    #[serde(default)]
    pub term_analysis: TermAnalysis,
    #[serde(default)]
    pub item_analysis: ItemAnalysis,
}

/// Training summary of a field.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSummarySchema {
    pub mean: Option<f64>,
    pub standard_deviation: Option<f64>,
    #[serde_as(as = "DefaultOnNull")]
    pub missing_count: u64,
    #[serde_as(as = "DefaultOnNull")]
    pub categories: Vec<(String, f64)>,
    #[serde_as(as = "DefaultOnNull")]
    pub term_forms: HashMap<String, Vec<String>>,
    #[serde_as(as = "DefaultOnNull")]
    pub tag_cloud: Vec<(String, f64)>,
    #[serde_as(as = "DefaultOnNull")]
    pub items: Vec<(String, f64)>,
}

// =============================================================================
// Nodes
// =============================================================================

/// Node predicate: `true` for the root, otherwise a split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateSchema {
    Unconditional(bool),
    Split(SplitSchema),
}

/// A split condition.
///
/// A trailing `*` on the operator (`"<=*"`) is the compact spelling of
/// `missing: true`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSchema {
    pub operator: String,
    pub field: String,
    #[serde(default)]
    pub value: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub missing: bool,
}

/// Distribution of the objective at a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveSummarySchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<(String, f64)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<(f64, f64)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<(f64, f64)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
}

/// One node of the exported tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSchema {
    pub id: u32,
    pub predicate: PredicateSchema,
    pub output: Json,
    #[serde(default)]
    pub count: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub objective_summary: ObjectiveSummarySchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_objective_summary: Option<ObjectiveSummarySchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g_sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSchema>,
}
