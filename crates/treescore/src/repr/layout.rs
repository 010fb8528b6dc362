//! Tree variants and their packed-record offset tables.
//!
//! A packed node record is a JSON array. Position 0 holds the predicate
//! header (`[opcode, field, value, term, missing]`, or `true` for the root);
//! the remaining positions are fixed per variant:
//!
//! | variant | positions 1.. |
//! |---|---|
//! | classification | id, output, count, confidence, distribution, children#, children |
//! | weighted classification | ... distribution, weighted distribution, weight, children#, children |
//! | regression | ... distribution, unit, bin count, max, min, median, children#, children |
//! | weighted regression | ... median, weighted distribution, weight, children#, children |
//! | boosting | id, output, count, g_sum, h_sum, children#, children |
//!
//! Leaves omit the trailing children list.

use serde::{Deserialize, Serialize};

/// Shape of the node statistics stored in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeVariant {
    Classification,
    WeightedClassification,
    Regression,
    WeightedRegression,
    Boosting,
}

impl TreeVariant {
    /// Select the variant of a tree from its model kind.
    pub fn select(regression: bool, weighted: bool, boosting: bool) -> Self {
        match (boosting, regression, weighted) {
            (true, _, _) => Self::Boosting,
            (false, true, false) => Self::Regression,
            (false, true, true) => Self::WeightedRegression,
            (false, false, false) => Self::Classification,
            (false, false, true) => Self::WeightedClassification,
        }
    }

    #[inline]
    pub fn is_regression(self) -> bool {
        matches!(self, Self::Regression | Self::WeightedRegression)
    }

    #[inline]
    pub fn is_classification(self) -> bool {
        matches!(self, Self::Classification | Self::WeightedClassification)
    }

    #[inline]
    pub fn is_weighted(self) -> bool {
        matches!(self, Self::WeightedClassification | Self::WeightedRegression)
    }

    /// The offset table of this variant.
    pub fn offsets(self) -> &'static OffsetTable {
        match self {
            Self::Classification => &CLASSIFICATION_OFFSETS,
            Self::WeightedClassification => &WEIGHTED_CLASSIFICATION_OFFSETS,
            Self::Regression => &REGRESSION_OFFSETS,
            Self::WeightedRegression => &WEIGHTED_REGRESSION_OFFSETS,
            Self::Boosting => &BOOSTING_OFFSETS,
        }
    }
}

impl std::fmt::Display for TreeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Classification => "classification",
            Self::WeightedClassification => "weighted classification",
            Self::Regression => "regression",
            Self::WeightedRegression => "weighted regression",
            Self::Boosting => "boosting",
        };
        f.write_str(name)
    }
}

/// Positions of each attribute in a packed node record.
///
/// Attributes a variant does not carry are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTable {
    pub variant: TreeVariant,
    pub predicate: usize,
    pub id: usize,
    pub output: usize,
    pub count: usize,
    pub confidence: Option<usize>,
    pub distribution: Option<usize>,
    pub distribution_unit: Option<usize>,
    pub bin_count: Option<usize>,
    pub max: Option<usize>,
    pub min: Option<usize>,
    pub median: Option<usize>,
    pub weighted_distribution: Option<usize>,
    pub weight: Option<usize>,
    pub g_sum: Option<usize>,
    pub h_sum: Option<usize>,
    pub children_count: usize,
    pub children: usize,
}

impl OffsetTable {
    /// Expected record length for a leaf or an internal node.
    #[inline]
    pub fn record_len(&self, is_leaf: bool) -> usize {
        if is_leaf {
            self.children
        } else {
            self.children + 1
        }
    }
}

pub const CLASSIFICATION_OFFSETS: OffsetTable = OffsetTable {
    variant: TreeVariant::Classification,
    predicate: 0,
    id: 1,
    output: 2,
    count: 3,
    confidence: Some(4),
    distribution: Some(5),
    distribution_unit: None,
    bin_count: None,
    max: None,
    min: None,
    median: None,
    weighted_distribution: None,
    weight: None,
    g_sum: None,
    h_sum: None,
    children_count: 6,
    children: 7,
};

pub const WEIGHTED_CLASSIFICATION_OFFSETS: OffsetTable = OffsetTable {
    variant: TreeVariant::WeightedClassification,
    weighted_distribution: Some(6),
    weight: Some(7),
    children_count: 8,
    children: 9,
    ..CLASSIFICATION_OFFSETS
};

pub const REGRESSION_OFFSETS: OffsetTable = OffsetTable {
    variant: TreeVariant::Regression,
    predicate: 0,
    id: 1,
    output: 2,
    count: 3,
    confidence: Some(4),
    distribution: Some(5),
    distribution_unit: Some(6),
    bin_count: Some(7),
    max: Some(8),
    min: Some(9),
    median: Some(10),
    weighted_distribution: None,
    weight: None,
    g_sum: None,
    h_sum: None,
    children_count: 11,
    children: 12,
};

pub const WEIGHTED_REGRESSION_OFFSETS: OffsetTable = OffsetTable {
    variant: TreeVariant::WeightedRegression,
    weighted_distribution: Some(11),
    weight: Some(12),
    children_count: 13,
    children: 14,
    ..REGRESSION_OFFSETS
};

pub const BOOSTING_OFFSETS: OffsetTable = OffsetTable {
    variant: TreeVariant::Boosting,
    predicate: 0,
    id: 1,
    output: 2,
    count: 3,
    confidence: None,
    distribution: None,
    distribution_unit: None,
    bin_count: None,
    max: None,
    min: None,
    median: None,
    weighted_distribution: None,
    weight: None,
    g_sum: Some(4),
    h_sum: Some(5),
    children_count: 6,
    children: 7,
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TreeVariant; 5] = [
        TreeVariant::Classification,
        TreeVariant::WeightedClassification,
        TreeVariant::Regression,
        TreeVariant::WeightedRegression,
        TreeVariant::Boosting,
    ];

    #[test]
    fn tables_match_their_variant() {
        for variant in ALL {
            assert_eq!(variant.offsets().variant, variant);
        }
    }

    #[test]
    fn offsets_are_distinct_and_dense() {
        for variant in ALL {
            let t = variant.offsets();
            let mut positions: Vec<usize> = [
                Some(t.predicate),
                Some(t.id),
                Some(t.output),
                Some(t.count),
                t.confidence,
                t.distribution,
                t.distribution_unit,
                t.bin_count,
                t.max,
                t.min,
                t.median,
                t.weighted_distribution,
                t.weight,
                t.g_sum,
                t.h_sum,
                Some(t.children_count),
                Some(t.children),
            ]
            .into_iter()
            .flatten()
            .collect();
            positions.sort_unstable();

            let expected: Vec<usize> = (0..=t.children).collect();
            assert_eq!(positions, expected, "{variant}");
        }
    }

    #[test]
    fn select_variant() {
        assert_eq!(TreeVariant::select(false, false, false), TreeVariant::Classification);
        assert_eq!(TreeVariant::select(true, true, false), TreeVariant::WeightedRegression);
        assert_eq!(TreeVariant::select(true, false, true), TreeVariant::Boosting);
    }
}
