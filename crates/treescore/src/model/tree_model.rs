//! Single-tree model: compact tree, field table and boosting options.

use serde::{Deserialize, Serialize};

use crate::ensemble::{BoostingWeight, Vote};
use crate::inference::{Prediction, Traversal, DEFAULT_LAMBDA};
use crate::repr::{CompactTree, Fields, InputRecord, TreeVariant};
use crate::utils::Parallelism;

use super::config::PredictConfig;

/// Boosting options of a tree that belongs to a boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingInfo {
    /// L2 regularization of leaf outputs.
    pub lambda: f64,
    /// Weight of the tree's iteration.
    pub weight: f64,
    /// Class scored by the tree, for classification ensembles.
    pub objective_class: Option<String>,
}

impl Default for BoostingInfo {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
            weight: 1.0,
            objective_class: None,
        }
    }
}

/// A trained decision tree ready for local prediction.
///
/// # Example
///
/// ```
/// use treescore::model::TreeModel;
/// use treescore::repr::{
///     ClassificationStats, CompactTree, FieldDescriptor, Fields, InputRecord, Node, NodeStats,
///     Operator, Optype, Predicate, TreeVariant,
/// };
///
/// let stats = |output: &str, a: f64, b: f64| {
///     NodeStats::Classification(ClassificationStats {
///         output: output.into(),
///         count: a + b,
///         confidence: None,
///         distribution: vec![("a".into(), a), ("b".into(), b)],
///     })
/// };
/// let root = Node::leaf(0, None, stats("a", 3.0, 2.0)).with_children(vec![
///     Node::leaf(1, Some(Predicate::new(Operator::Lt, "x", 1.0)), stats("a", 3.0, 0.0)),
///     Node::leaf(2, Some(Predicate::new(Operator::Ge, "x", 1.0)), stats("b", 0.0, 2.0)),
/// ]);
/// let tree = CompactTree::build(&root, TreeVariant::Classification).unwrap();
/// let fields = Fields::new().with(FieldDescriptor::new("x", "x", Optype::Numeric));
/// let model = TreeModel::new(tree, fields, "y");
///
/// let p = model.predict(&InputRecord::new().with("x", 2.0));
/// assert_eq!(p.output.as_category(), Some("b"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TreeModel {
    tree: CompactTree,
    fields: Fields,
    objective_field: String,
    boosting: Option<BoostingInfo>,
}

impl TreeModel {
    pub fn new(tree: CompactTree, fields: Fields, objective_field: impl Into<String>) -> Self {
        Self {
            tree,
            fields,
            objective_field: objective_field.into(),
            boosting: None,
        }
    }

    /// Mark the tree as a member of a boosted ensemble.
    pub fn with_boosting(mut self, boosting: BoostingInfo) -> Self {
        self.boosting = Some(boosting);
        self
    }

    #[inline]
    pub fn tree(&self) -> &CompactTree {
        &self.tree
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    #[inline]
    pub fn objective_field(&self) -> &str {
        &self.objective_field
    }

    #[inline]
    pub fn boosting(&self) -> Option<&BoostingInfo> {
        self.boosting.as_ref()
    }

    #[inline]
    pub fn variant(&self) -> TreeVariant {
        self.tree.variant()
    }

    /// Traversal configured from `config` and the boosting options.
    pub fn traversal(&self, config: &PredictConfig) -> Traversal<'_> {
        let lambda = self.boosting.as_ref().map_or(DEFAULT_LAMBDA, |b| b.lambda);
        Traversal::new(&self.tree, &self.fields)
            .with_z(config.z)
            .with_bins_limit(config.bins_limit)
            .with_lambda(lambda)
    }

    /// Predict with the default configuration.
    pub fn predict(&self, record: &InputRecord) -> Prediction {
        self.predict_with(record, &PredictConfig::default())
    }

    pub fn predict_with(&self, record: &InputRecord, config: &PredictConfig) -> Prediction {
        self.traversal(config).predict(record, config.missing_strategy)
    }

    /// Predict many records; the output order matches `records`.
    pub fn predict_batch(
        &self,
        records: &[InputRecord],
        config: &PredictConfig,
        parallelism: Parallelism,
    ) -> Vec<Prediction> {
        let traversal = self.traversal(config);
        parallelism.maybe_par_map(records, |record| {
            traversal.predict(record, config.missing_strategy)
        })
    }

    /// This model's vote for an ensemble combination.
    pub fn vote(&self, record: &InputRecord, config: &PredictConfig) -> Vote {
        let vote = Vote::new(self.predict_with(record, config));
        match &self.boosting {
            Some(b) => vote.with_boosting(BoostingWeight {
                weight: b.weight,
                objective_class: b.objective_class.clone(),
            }),
            None => vote,
        }
    }
}
