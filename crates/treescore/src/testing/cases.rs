use std::collections::HashMap;

use serde::Deserialize;

use crate::repr::InputRecord;

/// Input records for a test case, loaded from JSON.
///
/// Expects JSON format:
/// ```json
/// {
///   "records": [{"petal length": 1.0, "color": null}, {}]
/// }
/// ```
///
/// `null` values and absent keys are both missing.
#[derive(Debug, Deserialize)]
pub struct TestInput {
    pub records: Vec<InputRecord>,
}

/// Expected attributes of one prediction.
///
/// Only the attributes present in the fixture are checked.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedPrediction {
    /// Category name or number.
    pub output: serde_json::Value,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub path: Option<Vec<String>>,
}

/// Expected predictions for a test case, keyed by scenario.
///
/// Keys name a missing strategy (`last_prediction`, `proportional`) for
/// single trees or a combination method (`plurality`, ...) for ensembles:
/// ```json
/// {
///   "last_prediction": [{"output": "setosa", "confidence": 0.5655}],
///   "proportional": [{"output": "setosa"}]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct TestExpected {
    #[serde(flatten)]
    pub predictions: HashMap<String, Vec<ExpectedPrediction>>,
}

impl TestExpected {
    /// Expected predictions of one scenario.
    pub fn scenario(&self, key: &str) -> &[ExpectedPrediction] {
        self.predictions
            .get(key)
            .unwrap_or_else(|| panic!("no expectations for scenario {key}"))
    }
}
