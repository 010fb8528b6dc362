//! Prediction results.

use serde::Serialize;

use crate::repr::DistributionUnit;

use super::stats::total_count;

/// Predicted value: a category label or a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Category(String),
    Number(f64),
}

impl Output {
    #[inline]
    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Category(c) => Some(c),
            Self::Number(_) => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Category(_) => None,
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category(c) => f.write_str(c),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Instance distribution behind a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Distribution {
    Categories(Vec<(String, f64)>),
    Bins(Vec<(f64, f64)>),
}

impl Distribution {
    pub fn total(&self) -> f64 {
        match self {
            Self::Categories(d) => total_count(d),
            Self::Bins(d) => total_count(d),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Categories(d) => d.is_empty(),
            Self::Bins(d) => d.is_empty(),
        }
    }

    pub fn as_categories(&self) -> Option<&[(String, f64)]> {
        match self {
            Self::Categories(d) => Some(d),
            Self::Bins(_) => None,
        }
    }

    pub fn as_bins(&self) -> Option<&[(f64, f64)]> {
        match self {
            Self::Bins(d) => Some(d),
            Self::Categories(_) => None,
        }
    }
}

/// Result of scoring one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub output: Output,
    /// Confidence (classification) or error estimate (regression).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    pub distribution_unit: DistributionUnit,
    pub count: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Rules of the unique path followed from the root.
    pub path: Vec<String>,
    /// Ids of the children of the node the prediction was taken from.
    pub children: Vec<u32>,
}

impl Prediction {
    /// Prediction with only an output; every other attribute empty.
    pub fn from_output(output: Output) -> Self {
        Self {
            output,
            confidence: None,
            distribution: None,
            distribution_unit: DistributionUnit::default(),
            count: 0.0,
            median: None,
            min: None,
            max: None,
            path: Vec::new(),
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn is_classification(&self) -> bool {
        matches!(self.output, Output::Category(_))
    }

    /// Share of `category` in the class distribution.
    pub fn probability(&self, category: &str) -> Option<f64> {
        let d = self.distribution.as_ref()?.as_categories()?;
        let total = total_count(d);
        if total <= 0.0 {
            return None;
        }
        Some(d.iter().find(|(k, _)| k == category).map_or(0.0, |(_, c)| c / total))
    }

    /// Normalized class distribution, in distribution order.
    pub fn probabilities(&self) -> Vec<(String, f64)> {
        let Some(d) = self.distribution.as_ref().and_then(Distribution::as_categories) else {
            return Vec::new();
        };
        let total = total_count(d);
        if total <= 0.0 {
            return Vec::new();
        }
        d.iter().map(|(k, c)| (k.clone(), c / total)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified() -> Prediction {
        Prediction {
            distribution: Some(Distribution::Categories(vec![
                ("A".into(), 3.0),
                ("B".into(), 1.0),
            ])),
            count: 4.0,
            ..Prediction::from_output(Output::Category("A".into()))
        }
    }

    #[test]
    fn probabilities_are_normalized() {
        let p = classified();
        assert_eq!(p.probability("A"), Some(0.75));
        assert_eq!(p.probability("C"), Some(0.0));
        assert_eq!(p.probabilities(), vec![("A".into(), 0.75), ("B".into(), 0.25)]);
    }

    #[test]
    fn serializes_flat() {
        let json = serde_json::to_value(classified()).unwrap();
        assert_eq!(json["output"], "A");
        assert_eq!(json["distribution"][1], serde_json::json!(["B", 1.0]));
        assert_eq!(json["distribution_unit"], "categories");
        assert!(json.get("confidence").is_none());
    }
}
