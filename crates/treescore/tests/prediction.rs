//! Integration tests for prediction from JSON model exports.
//!
//! These tests load models from `<name>.model.json` fixtures and check the
//! predictions for `<name>.input.json` against `<name>.expected.json`.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use treescore::ensemble::CombineMethod;
use treescore::inference::MissingStrategy;
use treescore::model::{Ensemble, PredictConfig, TreeModel};
use treescore::testing::{assert_prediction_matches, TestExpected, TestInput, DEFAULT_TOLERANCE};
use treescore::{run_with_threads, Parallelism, TreeVariant};

// =============================================================================
// Test Data Loading
// =============================================================================

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

fn load_json<T: DeserializeOwned>(path: &Path) -> T {
    let file =
        File::open(path).unwrap_or_else(|e| panic!("Failed to open {}: {e}", path.display()));
    serde_json::from_reader(file)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()))
}

fn load_data(name: &str) -> (TestInput, TestExpected) {
    let dir = test_cases_dir();
    let input: TestInput = load_json(&dir.join(format!("{name}.input.json")));
    let expected: TestExpected = load_json(&dir.join(format!("{name}.expected.json")));
    (input, expected)
}

fn load_tree(name: &str) -> (TreeModel, TestInput, TestExpected) {
    let path = test_cases_dir().join(format!("{name}.model.json"));
    let model = TreeModel::load_json(&path)
        .unwrap_or_else(|e| panic!("Failed to load model {name} from {path:?}: {e}"));
    let (input, expected) = load_data(name);
    (model, input, expected)
}

fn load_ensemble(name: &str) -> (Ensemble, TestInput, TestExpected) {
    let path = test_cases_dir().join(format!("{name}.model.json"));
    let ensemble = Ensemble::load_json(&path)
        .unwrap_or_else(|e| panic!("Failed to load ensemble {name} from {path:?}: {e}"));
    let (input, expected) = load_data(name);
    (ensemble, input, expected)
}

fn config(strategy: MissingStrategy, method: CombineMethod) -> PredictConfig {
    PredictConfig::builder()
        .missing_strategy(strategy)
        .combine_method(method)
        .build()
        .expect("valid config")
}

const STRATEGIES: [(&str, MissingStrategy); 2] = [
    ("last_prediction", MissingStrategy::LastPrediction),
    ("proportional", MissingStrategy::Proportional),
];

// =============================================================================
// Helper Functions
// =============================================================================

fn check_tree(name: &str, variant: TreeVariant) {
    let (model, input, expected) = load_tree(name);
    assert_eq!(model.variant(), variant, "{name}: variant");

    for (key, strategy) in STRATEGIES {
        let cfg = config(strategy, CombineMethod::default());
        let cases = expected.scenario(key);
        assert_eq!(cases.len(), input.records.len(), "{name}/{key}: case count");

        for (i, (record, case)) in input.records.iter().zip(cases).enumerate() {
            let actual = model.predict_with(record, &cfg);
            assert_prediction_matches(&actual, case, DEFAULT_TOLERANCE, &format!("{name}/{key}[{i}]"));
        }
    }
}

fn check_ensemble(name: &str, scenario: &str, strategy: MissingStrategy, method: CombineMethod) {
    let (ensemble, input, expected) = load_ensemble(name);
    let cfg = config(strategy, method);

    for (i, (record, case)) in input.records.iter().zip(expected.scenario(scenario)).enumerate() {
        let actual = ensemble
            .predict(record, &cfg)
            .unwrap_or_else(|e| panic!("{name}/{scenario}[{i}]: {e}"));
        assert_prediction_matches(&actual, case, DEFAULT_TOLERANCE, &format!("{name}/{scenario}[{i}]"));
    }
}

// =============================================================================
// Single Trees
// =============================================================================

#[test]
fn classification_tree() {
    check_tree("classification", TreeVariant::Classification);
}

#[test]
fn regression_tree() {
    check_tree("regression", TreeVariant::Regression);
}

#[test]
fn text_and_items_splits() {
    check_tree("text", TreeVariant::Classification);
}

#[test]
fn weighted_classification_tree() {
    check_tree("weighted_classification", TreeVariant::WeightedClassification);
}

#[test]
fn weighted_regression_tree() {
    check_tree("weighted_regression", TreeVariant::WeightedRegression);
}

#[test]
fn batch_matches_single_predictions() {
    let (model, input, _) = load_tree("regression");
    let cfg = config(MissingStrategy::Proportional, CombineMethod::default());

    let single: Vec<_> = input.records.iter().map(|r| model.predict_with(r, &cfg)).collect();
    let sequential = model.predict_batch(&input.records, &cfg, Parallelism::Sequential);
    let parallel = model.predict_batch(&input.records, &cfg, Parallelism::Parallel);
    let pooled = run_with_threads(2, |p| model.predict_batch(&input.records, &cfg, p));

    assert_eq!(single, sequential);
    assert_eq!(single, parallel);
    assert_eq!(single, pooled);
}

#[test]
fn predictions_serialize_without_empty_attributes() {
    let (model, input, _) = load_tree("classification");
    let json = serde_json::to_value(model.predict(&input.records[0])).unwrap();

    assert_eq!(json["output"], "setosa");
    assert!(json.get("median").is_none());
    assert_eq!(json["path"][0], "petal length <= 2.45");
}

// =============================================================================
// Ensembles
// =============================================================================

#[test]
fn boosted_ensemble() {
    let (ensemble, _, _) = load_ensemble("boosted");
    assert!(ensemble.is_boosted());
    assert_eq!(ensemble.len(), 2);

    for (key, strategy) in STRATEGIES {
        // Boosted ensembles ignore the configured combination method.
        check_ensemble("boosted", key, strategy, CombineMethod::Plurality);
    }
}

#[test]
fn forest_plurality() {
    check_ensemble(
        "forest",
        "plurality",
        MissingStrategy::LastPrediction,
        CombineMethod::Plurality,
    );
}

#[test]
fn forest_confidence_weighted() {
    check_ensemble(
        "forest",
        "confidence_weighted",
        MissingStrategy::LastPrediction,
        CombineMethod::ConfidenceWeighted,
    );
}

#[test]
fn forest_probability_weighted() {
    check_ensemble(
        "forest",
        "probability_weighted",
        MissingStrategy::LastPrediction,
        CombineMethod::ProbabilityWeighted,
    );
}

#[test]
fn forest_plurality_proportional() {
    check_ensemble(
        "forest",
        "plurality_proportional",
        MissingStrategy::Proportional,
        CombineMethod::Plurality,
    );
}

#[test]
fn forest_batch_preserves_order() {
    let (ensemble, input, expected) = load_ensemble("forest");
    let cfg = config(MissingStrategy::LastPrediction, CombineMethod::Plurality);

    let batch = ensemble
        .predict_batch(&input.records, &cfg, Parallelism::Parallel)
        .unwrap();
    for (i, (actual, case)) in batch.iter().zip(expected.scenario("plurality")).enumerate() {
        assert_prediction_matches(actual, case, DEFAULT_TOLERANCE, &format!("batch[{i}]"));
    }
}

#[test]
fn forest_threshold_requires_votes() {
    let (ensemble, input, _) = load_ensemble("forest");
    let method = CombineMethod::Threshold {
        threshold: 1,
        category: "b".into(),
    };
    let cfg = config(MissingStrategy::LastPrediction, method);

    // One of three trees votes "b" for x = 1.5.
    let p = ensemble.predict(&input.records[0], &cfg).unwrap();
    assert_eq!(p.output.as_category(), Some("b"));
    assert!((p.confidence.unwrap() - 0.44).abs() < DEFAULT_TOLERANCE);
}
