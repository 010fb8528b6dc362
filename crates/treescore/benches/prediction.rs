//! Prediction benchmarks for treescore.
//!
//! Benchmarks cover:
//! - LAST_PREDICTION vs PROPORTIONAL on complete and sparse records
//! - Different batch sizes (1, 100, 10K)
//! - Ensemble combination, sequential vs parallel
//!
//! # Running benchmarks
//!
//! ```bash
//! cargo bench -p treescore
//! ```
//!
//! HTML reports are generated in `target/criterion/`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use treescore::ensemble::CombineMethod;
use treescore::inference::MissingStrategy;
use treescore::model::{Ensemble, PredictConfig, TreeModel};
use treescore::repr::{
    ClassificationStats, CompactTree, FieldDescriptor, Fields, InputRecord, Node, NodeStats,
    Operator, Optype, Predicate, TreeVariant,
};
use treescore::Parallelism;

const N_FIELDS: usize = 10;
const DEPTH: u32 = 8;

// =============================================================================
// Benchmark Data Setup
// =============================================================================

fn field_id(i: usize) -> String {
    format!("f{i}")
}

fn fields() -> Fields {
    (0..N_FIELDS)
        .map(|i| FieldDescriptor::new(field_id(i), field_id(i), Optype::Numeric))
        .collect()
}

fn class_stats(rng: &mut StdRng) -> NodeStats {
    let a = rng.gen_range(1.0..50.0f64).round();
    let b = rng.gen_range(1.0..50.0f64).round();
    NodeStats::Classification(ClassificationStats {
        output: if a >= b { "a" } else { "b" }.into(),
        count: a + b,
        confidence: Some(0.5),
        distribution: vec![("a".into(), a), ("b".into(), b)],
    })
}

/// Balanced binary tree with random splits on random fields.
fn random_node(rng: &mut StdRng, next_id: &mut u32, depth: u32, predicate: Option<Predicate>) -> Node {
    let id = *next_id;
    *next_id += 1;
    let node = Node::leaf(id, predicate, class_stats(rng));
    if depth == 0 {
        return node;
    }

    let field = field_id(rng.gen_range(0..N_FIELDS));
    let threshold = rng.gen_range(-5.0..5.0f64);
    let left = random_node(rng, next_id, depth - 1, Some(Predicate::new(Operator::Lt, field.as_str(), threshold)));
    let right = random_node(rng, next_id, depth - 1, Some(Predicate::new(Operator::Ge, field.as_str(), threshold)));
    node.with_children(vec![left, right])
}

fn random_model(seed: u64) -> TreeModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let root = random_node(&mut rng, &mut 0, DEPTH, None);
    let tree = CompactTree::build(&root, TreeVariant::Classification).expect("valid tree");
    TreeModel::new(tree, fields(), "label")
}

/// Random records; each field is absent with probability `missing`.
fn generate_records(n_rows: usize, missing: f64, seed: u64) -> Vec<InputRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_rows)
        .map(|_| {
            (0..N_FIELDS)
                .filter_map(|i| {
                    let present = !rng.gen_bool(missing);
                    present.then(|| (field_id(i), rng.gen_range(-5.0..5.0f64)))
                })
                .collect()
        })
        .collect()
}

fn config(strategy: MissingStrategy) -> PredictConfig {
    PredictConfig::builder()
        .missing_strategy(strategy)
        .combine_method(CombineMethod::Plurality)
        .build()
        .expect("valid config")
}

// =============================================================================
// Benchmark Groups
// =============================================================================

/// Missing strategies on complete and sparse records.
fn bench_strategies(c: &mut Criterion) {
    let model = random_model(42);
    let mut group = c.benchmark_group("strategy");

    for (label, missing) in [("complete", 0.0), ("sparse", 0.3)] {
        let records = generate_records(1_000, missing, 7);
        group.throughput(Throughput::Elements(records.len() as u64));

        for (name, strategy) in [
            ("last_prediction", MissingStrategy::LastPrediction),
            ("proportional", MissingStrategy::Proportional),
        ] {
            let cfg = config(strategy);
            group.bench_with_input(BenchmarkId::new(name, label), &records, |b, records| {
                b.iter(|| {
                    let output = model.predict_batch(black_box(records), &cfg, Parallelism::Sequential);
                    black_box(output)
                });
            });
        }
    }

    group.finish();
}

/// Batch sizes, sequential vs parallel.
fn bench_batch_sizes(c: &mut Criterion) {
    let model = random_model(42);
    let cfg = config(MissingStrategy::Proportional);
    let mut group = c.benchmark_group("batch_size");

    for batch_size in [1usize, 100, 10_000] {
        let records = generate_records(batch_size, 0.1, 7);
        group.throughput(Throughput::Elements(batch_size as u64));

        for (name, parallelism) in [("sequential", Parallelism::Sequential), ("parallel", Parallelism::Parallel)] {
            group.bench_with_input(BenchmarkId::new(name, batch_size), &records, |b, records| {
                b.iter(|| black_box(model.predict_batch(black_box(records), &cfg, parallelism)));
            });
        }
    }

    group.finish();
}

/// Ten-tree ensemble combined by plurality.
fn bench_ensemble(c: &mut Criterion) {
    let ensemble = Ensemble::from_models((0..10).map(random_model).collect()).expect("non-empty");
    let cfg = config(MissingStrategy::LastPrediction);
    let records = generate_records(1_000, 0.1, 7);

    let mut group = c.benchmark_group("ensemble");
    group.throughput(Throughput::Elements(records.len() as u64));
    for (name, parallelism) in [("sequential", Parallelism::Sequential), ("parallel", Parallelism::Parallel)] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(ensemble.predict_batch(black_box(&records), &cfg, parallelism)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strategies, bench_batch_sizes, bench_ensemble);
criterion_main!(benches);
