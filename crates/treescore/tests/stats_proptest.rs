//! Property-based tests for distribution statistics and traversal.
//!
//! These tests use proptest to generate arbitrary distributions and records
//! and check the invariants the estimators and strategies promise.

use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use treescore::inference::stats::{
    dist_median, merge_bins, merge_distributions, total_count, wilson_lower_bound, ws_confidence,
};
use treescore::inference::{MissingStrategy, Traversal};
use treescore::repr::{
    ClassificationStats, CompactTree, FieldDescriptor, Fields, InputRecord, Node, NodeStats,
    Operator, Optype, Predicate, TreeVariant,
};

// =============================================================================
// Arbitrary Generators
// =============================================================================

/// Regression bins with integral counts, so sums are exact.
fn arb_bins() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop_vec((-1e3f64..1e3, 1u32..20), 0..60)
        .prop_map(|bins| bins.into_iter().map(|(v, c)| (v, c as f64)).collect())
}

/// Class distributions over a small alphabet, possibly with repeated keys.
fn arb_categories() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop_vec((0u8..6, 0u32..50), 0..10).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(k, c)| (format!("c{k}"), c as f64))
            .collect()
    })
}

fn leaf(id: u32, predicate: Predicate, output: &str, a: f64, b: f64) -> Node {
    Node::leaf(
        id,
        Some(predicate),
        NodeStats::Classification(ClassificationStats {
            output: output.into(),
            count: a + b,
            confidence: Some(0.5),
            distribution: vec![("a".into(), a), ("b".into(), b)],
        }),
    )
}

/// Depth-two tree splitting on `x` at 0, then on `y` at 0.
fn two_level_tree() -> (CompactTree, Fields) {
    let inner = |id: u32, predicate: Predicate, a: f64, b: f64| {
        leaf(id, predicate, if a >= b { "a" } else { "b" }, a, b).with_children(vec![
            leaf(id * 10 + 1, Predicate::new(Operator::Lt, "y", 0.0), "a", a, 1.0),
            leaf(id * 10 + 2, Predicate::new(Operator::Ge, "y", 0.0), "b", 1.0, b),
        ])
    };
    let root = Node::leaf(
        0,
        None,
        NodeStats::Classification(ClassificationStats {
            output: "a".into(),
            count: 20.0,
            confidence: None,
            distribution: vec![("a".into(), 11.0), ("b".into(), 9.0)],
        }),
    )
    .with_children(vec![
        inner(1, Predicate::new(Operator::Lt, "x", 0.0), 7.0, 2.0),
        inner(2, Predicate::new(Operator::Ge, "x", 0.0), 4.0, 7.0),
    ]);

    let tree = CompactTree::build(&root, TreeVariant::Classification).expect("valid tree");
    let fields = Fields::new()
        .with(FieldDescriptor::new("x", "x", Optype::Numeric))
        .with(FieldDescriptor::new("y", "y", Optype::Numeric));
    (tree, fields)
}

fn record(x: Option<f64>, y: Option<f64>) -> InputRecord {
    let mut record = InputRecord::new();
    if let Some(x) = x {
        record.insert("x", x);
    }
    if let Some(y) = y {
        record.insert("y", y);
    }
    record
}

// =============================================================================
// Distribution Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn merge_bins_respects_limit(bins in arb_bins(), limit in 0usize..40) {
        let merged = merge_bins(&bins, limit);
        prop_assert!(merged.len() <= limit.max(1));
        prop_assert!(merged.len() <= bins.len());
        prop_assert!(merged.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn merge_bins_conserves_count(bins in arb_bins(), limit in 1usize..40) {
        let merged = merge_bins(&bins, limit);
        prop_assert_eq!(total_count(&merged), total_count(&bins));
    }

    #[test]
    fn merge_bins_is_idempotent(bins in arb_bins(), limit in 1usize..40) {
        let once = merge_bins(&bins, limit);
        prop_assert_eq!(merge_bins(&once, limit), once);
    }

    #[test]
    fn merge_distributions_commutes(a in arb_categories(), b in arb_categories()) {
        prop_assert_eq!(merge_distributions(&a, &b), merge_distributions(&b, &a));
    }

    #[test]
    fn merge_distributions_associates(
        a in arb_categories(),
        b in arb_categories(),
        c in arb_categories(),
    ) {
        let left = merge_distributions(&merge_distributions(&a, &b), &c);
        let right = merge_distributions(&a, &merge_distributions(&b, &c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn merge_distributions_has_unique_sorted_keys(a in arb_categories(), b in arb_categories()) {
        let merged = merge_distributions(&a, &b);
        prop_assert!(merged.windows(2).all(|w| w[0].0 < w[1].0));
        prop_assert_eq!(total_count(&merged), total_count(&a) + total_count(&b));
    }

    #[test]
    fn median_lies_within_bins(bins in arb_bins()) {
        let bins = merge_distributions(&bins, &[]);
        let count = total_count(&bins);
        match dist_median(&bins, count) {
            Some(median) => {
                prop_assert!(median >= bins[0].0);
                prop_assert!(median <= bins[bins.len() - 1].0);
            }
            None => prop_assert!(bins.is_empty()),
        }
    }
}

// =============================================================================
// Confidence Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn wilson_bound_is_below_proportion(p in 0.0f64..=1.0, n in 1.0f64..1e4, z in 0.1f64..4.0) {
        let bound = wilson_lower_bound(p, n, z).unwrap();
        prop_assert!((0.0..=1.0).contains(&bound));
        prop_assert!(bound <= p + 1e-12);
    }

    #[test]
    fn ws_confidence_is_a_probability(dist in arb_categories(), pick in 0u8..6) {
        let dist = merge_distributions(&dist, &[]);
        let category = format!("c{pick}");
        match ws_confidence(&category, &dist, 1.96) {
            Some(c) => prop_assert!((0.0..=1.0).contains(&c)),
            None => prop_assert!(
                total_count(&dist) <= 0.0 || dist.iter().all(|(k, _)| *k != category)
            ),
        }
    }
}

// =============================================================================
// Traversal Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn strategies_agree_on_complete_records(x in -5.0f64..5.0, y in -5.0f64..5.0) {
        let (tree, fields) = two_level_tree();
        let traversal = Traversal::new(&tree, &fields);
        let record = record(Some(x), Some(y));

        let last = traversal.predict(&record, MissingStrategy::LastPrediction);
        let proportional = traversal.predict(&record, MissingStrategy::Proportional);
        prop_assert_eq!(last, proportional);
    }

    #[test]
    fn proportional_output_is_known(x in prop::option::of(-5.0f64..5.0), y in prop::option::of(-5.0f64..5.0)) {
        let (tree, fields) = two_level_tree();
        let p = Traversal::new(&tree, &fields).proportional(&record(x, y));

        let category = p.output.as_category().unwrap();
        prop_assert!(category == "a" || category == "b");
        prop_assert!(p.count > 0.0 && p.count <= 24.0);
        if let Some(c) = p.confidence {
            prop_assert!((0.0..=1.0).contains(&c));
        }
    }
}
