//! Tree traversal with missing-data strategies.
//!
//! # Available Strategies
//!
//! - [`MissingStrategy::LastPrediction`]: follow the first matching child;
//!   when none matches, answer with the node where the walk stopped.
//! - [`MissingStrategy::Proportional`]: when the split field is missing and
//!   the split has no missing branch, follow every child and merge what the
//!   reached leaves hold.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::repr::{CompactTree, DistributionUnit, Fields, InputRecord, NodeId, NodeStats};

use super::prediction::{Distribution, Output, Prediction};
use super::stats::{
    dist_median, mean, merge_bins, merge_distributions, regression_error, total_count,
    unbiased_sample_variance, ws_confidence, BINS_LIMIT, DEFAULT_Z,
};

/// How a traversal handles a split on a field absent from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    #[default]
    LastPrediction,
    Proportional,
}

/// Default L2 regularization of boosted leaf outputs.
pub const DEFAULT_LAMBDA: f64 = 1.0;

// =============================================================================
// Single-path Rule
// =============================================================================

/// Whether the children of `node` still determine a single path for `record`.
///
/// True when the split field is present, or when a child predicate matches
/// missing values, tests for a null value or counts a term (an absent text
/// has zero occurrences of every term).
pub fn one_branch(tree: &CompactTree, node: NodeId, record: &InputRecord) -> bool {
    let Some(field) = tree.split_field(node) else {
        return true;
    };
    if record.contains(field) {
        return true;
    }
    tree.child_ids(node)
        .filter_map(|child| tree.node(child).predicate())
        .any(|p| p.missing() || p.value().is_null() || p.term().is_some())
}

fn push_rule(path: &mut Vec<String>, rule: String) {
    if !path.contains(&rule) {
        path.push(rule);
    }
}

// =============================================================================
// Traversal
// =============================================================================

/// Scores records against one compact tree.
#[derive(Debug, Clone, Copy)]
pub struct Traversal<'a> {
    tree: &'a CompactTree,
    fields: &'a Fields,
    z: f64,
    bins_limit: usize,
    lambda: f64,
}

impl<'a> Traversal<'a> {
    pub fn new(tree: &'a CompactTree, fields: &'a Fields) -> Self {
        Self {
            tree,
            fields,
            z: DEFAULT_Z,
            bins_limit: BINS_LIMIT,
            lambda: DEFAULT_LAMBDA,
        }
    }

    /// Z-score of the confidence estimators.
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }

    /// Bin cap of merged regression distributions.
    pub fn with_bins_limit(mut self, bins_limit: usize) -> Self {
        self.bins_limit = bins_limit;
        self
    }

    /// Regularization used when recomputing boosted outputs.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn predict(&self, record: &InputRecord, strategy: MissingStrategy) -> Prediction {
        match strategy {
            MissingStrategy::LastPrediction => self.last_prediction(record),
            MissingStrategy::Proportional => self.proportional(record),
        }
    }

    /// First child of `node` whose predicate holds.
    fn matching_child(&self, node: NodeId, record: &InputRecord) -> Option<NodeId> {
        self.tree.child_ids(node).find(|&child| {
            self.tree
                .node(child)
                .predicate()
                .is_some_and(|p| p.apply(record, self.fields))
        })
    }

    fn rule(&self, node: NodeId) -> Option<String> {
        self.tree.node(node).predicate().map(|p| p.to_rule(self.fields))
    }

    /// Walk down while some child matches; answer with the last node reached.
    pub fn last_prediction(&self, record: &InputRecord) -> Prediction {
        let mut node = self.tree.root();
        let mut path = Vec::new();

        while let Some(child) = self.matching_child(node, record) {
            if let Some(rule) = self.rule(child) {
                push_rule(&mut path, rule);
            }
            node = child;
        }
        self.node_prediction(node, path)
    }

    /// Walk down, forking into every child at the first split that cannot be
    /// decided, and merge the distributions of everything reached.
    pub fn proportional(&self, record: &InputRecord) -> Prediction {
        let mut path = Vec::new();
        let mut reached = Reached::default();
        let (last_node, forked) = self.walk(self.tree.root(), record, Some(&mut path), &mut reached);

        if !forked {
            return self.node_prediction(last_node, path);
        }
        self.merged_prediction(last_node, reached, path)
    }

    fn walk(
        &self,
        node: NodeId,
        record: &InputRecord,
        mut path: Option<&mut Vec<String>>,
        reached: &mut Reached,
    ) -> (NodeId, bool) {
        let current = self.tree.node(node);
        if current.is_leaf() {
            reached.add(current.stats());
            return (node, false);
        }

        if one_branch(self.tree, node, record) {
            let Some(child) = self.matching_child(node, record) else {
                reached.add(current.stats());
                return (node, false);
            };
            if let (Some(path), Some(rule)) = (path.as_deref_mut(), self.rule(child)) {
                push_rule(path, rule);
            }
            return self.walk(child, record, path, reached);
        }

        trace!(
            node = current.id(),
            field = self.tree.split_field(node).unwrap_or_default(),
            "split field missing, following every branch"
        );
        for child in self.tree.child_ids(node) {
            self.walk(child, record, None, reached);
        }
        (node, true)
    }

    fn child_ids(&self, node: NodeId) -> Vec<u32> {
        self.tree
            .child_ids(node)
            .map(|child| self.tree.node(child).id())
            .collect()
    }

    /// Prediction from the stats stored at `node`.
    pub fn node_prediction(&self, node: NodeId, path: Vec<String>) -> Prediction {
        let children = self.child_ids(node);
        match self.tree.node(node).stats() {
            NodeStats::Classification(s) | NodeStats::WeightedClassification(s, _) => Prediction {
                output: Output::Category(s.output.clone()),
                confidence: s.confidence,
                distribution: Some(Distribution::Categories(s.distribution.clone())),
                distribution_unit: DistributionUnit::Categories,
                count: s.count,
                median: None,
                min: None,
                max: None,
                path,
                children,
            },
            NodeStats::Regression(s) | NodeStats::WeightedRegression(s, _) => Prediction {
                output: Output::Number(s.output),
                confidence: s.confidence,
                distribution: Some(Distribution::Bins(s.distribution.clone())),
                distribution_unit: s.distribution_unit,
                count: s.count,
                median: s.median,
                min: s.min,
                max: s.max,
                path,
                children,
            },
            NodeStats::Boosting(s) => Prediction {
                count: s.count,
                path,
                children,
                ..Prediction::from_output(Output::Number(s.output))
            },
        }
    }

    fn merged_prediction(&self, last_node: NodeId, reached: Reached, path: Vec<String>) -> Prediction {
        let variant = self.tree.variant();
        let children = self.child_ids(last_node);

        if variant.is_classification() {
            let mut ranked = reached.categories.clone();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let Some((output, _)) = ranked.first().cloned() else {
                return self.node_prediction(last_node, path);
            };
            let confidence = ws_confidence(&output, &reached.categories, self.z);
            return Prediction {
                output: Output::Category(output),
                confidence,
                count: reached.count,
                distribution: Some(Distribution::Categories(reached.categories)),
                distribution_unit: DistributionUnit::Categories,
                median: None,
                min: None,
                max: None,
                path,
                children,
            };
        }

        if variant.is_regression() {
            let single_instance = matches!(reached.bins.as_slice(), [(_, c)] if *c == 1.0);
            if reached.bins.is_empty() || (single_instance && !variant.is_weighted()) {
                return self.node_prediction(last_node, path);
            }

            let unit = if reached.binned || reached.bins.len() > self.bins_limit {
                DistributionUnit::Bins
            } else {
                DistributionUnit::Counts
            };
            let bins = merge_bins(&reached.bins, self.bins_limit);
            let population = total_count(&bins);
            let output = mean(&bins).unwrap_or_default();
            let confidence = unbiased_sample_variance(&bins, output)
                .and_then(|variance| regression_error(variance, population, self.z));

            return Prediction {
                output: Output::Number(output),
                confidence,
                median: dist_median(&bins, population),
                distribution: Some(Distribution::Bins(bins)),
                distribution_unit: unit,
                count: reached.count,
                min: reached.min,
                max: reached.max,
                path,
                children,
            };
        }

        let denominator = reached.h_sum + self.lambda;
        let output = if denominator == 0.0 {
            0.0
        } else {
            -reached.g_sum / denominator
        };
        Prediction {
            count: reached.count,
            path,
            children,
            ..Prediction::from_output(Output::Number(output))
        }
    }
}

/// Scores `record` with default estimator settings.
pub fn predict(
    tree: &CompactTree,
    fields: &Fields,
    record: &InputRecord,
    strategy: MissingStrategy,
) -> Prediction {
    Traversal::new(tree, fields).predict(record, strategy)
}

// =============================================================================
// Reached Leaves
// =============================================================================

/// What the nodes reached by a proportional walk hold, merged.
#[derive(Debug, Default)]
struct Reached {
    categories: Vec<(String, f64)>,
    bins: Vec<(f64, f64)>,
    /// Some reached leaf already held approximate bins.
    binned: bool,
    min: Option<f64>,
    max: Option<f64>,
    g_sum: f64,
    h_sum: f64,
    count: f64,
}

impl Reached {
    fn add(&mut self, stats: &NodeStats) {
        self.count += stats.count();
        match stats {
            NodeStats::Classification(s) => {
                self.categories = merge_distributions(&self.categories, &s.distribution);
            }
            NodeStats::WeightedClassification(_, w) => {
                self.categories = merge_distributions(&self.categories, &w.distribution);
            }
            NodeStats::Regression(s) => {
                self.add_bins(&s.distribution, s.min, s.max);
                self.binned |= s.distribution_unit == DistributionUnit::Bins;
            }
            NodeStats::WeightedRegression(s, w) => {
                self.add_bins(&w.distribution, s.min, s.max);
                self.binned |= s.distribution_unit == DistributionUnit::Bins;
            }
            NodeStats::Boosting(s) => {
                self.g_sum += s.g_sum;
                self.h_sum += s.h_sum;
            }
        }
    }

    fn add_bins(&mut self, bins: &[(f64, f64)], min: Option<f64>, max: Option<f64>) {
        self.bins = merge_distributions(&self.bins, bins);
        self.min = fold_option(self.min, min, f64::min);
        self.max = fold_option(self.max, max, f64::max);
    }
}

fn fold_option(acc: Option<f64>, value: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(f(a, v)),
        (a, v) => a.or(v),
    }
}
