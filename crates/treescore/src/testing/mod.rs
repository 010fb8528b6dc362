//! Test utilities shared by unit and integration tests.
//!
//! Fixtures come in triples under `tests/test-cases/`:
//! `<name>.model.json`, `<name>.input.json` and `<name>.expected.json`.

mod cases;

use approx::abs_diff_eq;

use crate::inference::{Output, Prediction};

pub use cases::{ExpectedPrediction, TestExpected, TestInput};

/// Default absolute tolerance for comparing predicted numbers.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

fn close(actual: Option<f64>, expected: f64, tolerance: f64) -> bool {
    actual.is_some_and(|a| abs_diff_eq!(a, expected, epsilon = tolerance))
}

/// Assert that `actual` agrees with every attribute `expected` specifies.
pub fn assert_prediction_matches(
    actual: &Prediction,
    expected: &ExpectedPrediction,
    tolerance: f64,
    context: &str,
) {
    match (&actual.output, &expected.output) {
        (Output::Category(a), serde_json::Value::String(e)) => {
            assert_eq!(a, e, "{context}: output");
        }
        (Output::Number(a), e) => {
            let e = e
                .as_f64()
                .unwrap_or_else(|| panic!("{context}: expected output {e} is not a number"));
            assert!(
                abs_diff_eq!(*a, e, epsilon = tolerance),
                "{context}: output {a} != {e}"
            );
        }
        (a, e) => panic!("{context}: output {a} does not match expected {e}"),
    }

    let numbers = [
        ("confidence", actual.confidence, expected.confidence),
        ("count", Some(actual.count), expected.count),
        ("median", actual.median, expected.median),
        ("min", actual.min, expected.min),
        ("max", actual.max, expected.max),
    ];
    for (name, a, e) in numbers {
        if let Some(e) = e {
            assert!(close(a, e, tolerance), "{context}: {name} {a:?} != {e}");
        }
    }

    if let Some(path) = &expected.path {
        assert_eq!(&actual.path, path, "{context}: path");
    }
}
