//! Model representation types.
//!
//! - [`Value`], [`InputRecord`]: typed input data
//! - [`Fields`]: field descriptors and text/items analysis options
//! - [`Predicate`]: split conditions
//! - [`Node`]: recursive node graph as read from an export
//! - [`CompactTree`]: breadth-first arena used for prediction
//! - [`TreeVariant`], [`OffsetTable`]: per-variant packed record layouts

mod compact;
mod field;
mod layout;
mod node;
mod packed;
mod predicate;
mod value;

/// Index of a node inside a [`CompactTree`] arena.
pub type NodeId = u32;

pub use compact::{CompactNode, CompactTree, LayoutError, TreeValidationError};
pub use field::{
    FieldDescriptor, FieldSummary, Fields, ItemAnalysis, Optype, TermAnalysis, TokenMode,
};
pub use layout::{
    OffsetTable, TreeVariant, BOOSTING_OFFSETS, CLASSIFICATION_OFFSETS, REGRESSION_OFFSETS,
    WEIGHTED_CLASSIFICATION_OFFSETS, WEIGHTED_REGRESSION_OFFSETS,
};
pub use node::{
    BoostingStats, ClassificationStats, DistributionUnit, Node, NodeStats, RegressionStats,
    WeightedStats,
};
pub use predicate::{Operator, Predicate, PredicateValue};
pub use value::{InputRecord, Value};

pub(crate) use packed::unpack_predicate_value;
