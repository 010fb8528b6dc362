//! Recursive node graph and per-variant node statistics.
//!
//! [`Node`] is the pre-flattened form read from a model export. Prediction
//! runs on [`CompactTree`](super::CompactTree), which is built once from it.

use serde::{Deserialize, Serialize};

use super::layout::TreeVariant;
use super::predicate::Predicate;

/// What the keys of a node distribution are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionUnit {
    /// Category labels (classification).
    #[default]
    Categories,
    /// Exact numeric values (regression, small populations).
    Counts,
    /// Approximate numeric bins (regression, capped).
    Bins,
}

impl DistributionUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Counts => "counts",
            Self::Bins => "bins",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "categories" => Self::Categories,
            "counts" => Self::Counts,
            "bins" => Self::Bins,
            _ => return None,
        })
    }
}

/// Stats of a classification node.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationStats {
    pub output: String,
    pub count: f64,
    pub confidence: Option<f64>,
    pub distribution: Vec<(String, f64)>,
}

/// Stats of a regression node. `confidence` holds the node's error estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionStats {
    pub output: f64,
    pub count: f64,
    pub confidence: Option<f64>,
    pub distribution: Vec<(f64, f64)>,
    pub distribution_unit: DistributionUnit,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub median: Option<f64>,
}

/// Instance-weighted distribution carried by weighted trees.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedStats<K> {
    pub distribution: Vec<(K, f64)>,
    pub weight: f64,
}

/// Stats of a node of a boosted tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingStats {
    pub output: f64,
    pub count: f64,
    pub g_sum: f64,
    pub h_sum: f64,
}

/// Node statistics, one shape per tree variant.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStats {
    Classification(ClassificationStats),
    WeightedClassification(ClassificationStats, WeightedStats<String>),
    Regression(RegressionStats),
    WeightedRegression(RegressionStats, WeightedStats<f64>),
    Boosting(BoostingStats),
}

impl NodeStats {
    /// The tree variant this node shape belongs to.
    pub fn variant(&self) -> TreeVariant {
        match self {
            Self::Classification(_) => TreeVariant::Classification,
            Self::WeightedClassification(..) => TreeVariant::WeightedClassification,
            Self::Regression(_) => TreeVariant::Regression,
            Self::WeightedRegression(..) => TreeVariant::WeightedRegression,
            Self::Boosting(_) => TreeVariant::Boosting,
        }
    }

    /// Training instance count at the node.
    pub fn count(&self) -> f64 {
        match self {
            Self::Classification(s) | Self::WeightedClassification(s, _) => s.count,
            Self::Regression(s) | Self::WeightedRegression(s, _) => s.count,
            Self::Boosting(s) => s.count,
        }
    }
}

/// A node of the recursive tree graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u32,
    /// `None` for the unconditional root.
    pub predicate: Option<Predicate>,
    pub stats: NodeStats,
    pub children: Vec<Node>,
}

impl Node {
    /// Create a leaf.
    pub fn leaf(id: u32, predicate: Option<Predicate>, stats: NodeStats) -> Self {
        Self {
            id,
            predicate,
            stats,
            children: Vec::new(),
        }
    }

    /// Set children (builder pattern).
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
