//! Combination of the per-model predictions of an ensemble.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::inference::stats::{merge_distributions, total_count, ws_confidence_with_n, DEFAULT_Z};
use crate::inference::{Distribution, Output, Prediction};
use crate::repr::DistributionUnit;

use super::boosting::{combine_boosted, BoostingWeight, InitialOffset};

/// Spread the regression errors are rescaled to before weighting.
const ERROR_TOP_RANGE: f64 = 10.0;

/// How the votes of an ensemble are combined.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
    /// Majority category, or mean output for regression.
    #[default]
    Plurality,
    /// Votes weighted by confidence; regression weights by inverse error.
    ConfidenceWeighted,
    /// Averaged class probability vectors; regression as plurality.
    ProbabilityWeighted,
    /// `category` wins when at least `threshold` votes predict it.
    Threshold { threshold: usize, category: String },
    /// Weighted sum of boosted tree outputs.
    Boosting,
}

/// Errors raised when combining votes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CombineError {
    #[error("no votes to combine")]
    Empty,
    #[error("votes mix classification and regression outputs")]
    MixedOutputs,
    #[error("vote {order} has no confidence")]
    MissingConfidence { order: usize },
    #[error("vote {order} has no class distribution")]
    MissingDistribution { order: usize },
    #[error("threshold {threshold} exceeds the {votes} available votes")]
    ThresholdTooLarge { threshold: usize, votes: usize },
    #[error("vote {order} carries no boosting weight")]
    MissingBoosting { order: usize },
    #[error("{0} combination requires classification votes")]
    ClassificationOnly(&'static str),
}

/// One member's prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub prediction: Prediction,
    pub boosting: Option<BoostingWeight>,
}

impl Vote {
    pub fn new(prediction: Prediction) -> Self {
        Self {
            prediction,
            boosting: None,
        }
    }

    pub fn with_boosting(mut self, boosting: BoostingWeight) -> Self {
        self.boosting = Some(boosting);
        self
    }
}

impl From<Prediction> for Vote {
    fn from(prediction: Prediction) -> Self {
        Self::new(prediction)
    }
}

/// Ordered per-model predictions for one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiVote {
    votes: Vec<Vote>,
    offset: Option<InitialOffset>,
    z: Option<f64>,
}

impl MultiVote {
    pub fn new(votes: Vec<Vote>) -> Self {
        Self {
            votes,
            ..Self::default()
        }
    }

    /// Initial score used by [`CombineMethod::Boosting`].
    pub fn with_offset(mut self, offset: InitialOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Z-score used when a confidence is derived from distributions.
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn push(&mut self, vote: impl Into<Vote>) {
        self.votes.push(vote.into());
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    fn subset(&self, keep: impl Fn(&Vote) -> bool) -> Self {
        Self {
            votes: self.votes.iter().filter(|v| keep(*v)).cloned().collect(),
            offset: self.offset.clone(),
            z: self.z,
        }
    }

    /// Whether every vote is a classification; fails on a mix.
    fn is_classification(&self) -> Result<bool, CombineError> {
        let first = self.votes.first().ok_or(CombineError::Empty)?;
        let classification = first.prediction.is_classification();
        if self
            .votes
            .iter()
            .any(|v| v.prediction.is_classification() != classification)
        {
            return Err(CombineError::MixedOutputs);
        }
        Ok(classification)
    }

    /// Combine the votes into one prediction.
    pub fn combine(&self, method: &CombineMethod) -> Result<Prediction, CombineError> {
        if self.votes.is_empty() {
            return Err(CombineError::Empty);
        }
        debug!(votes = self.votes.len(), ?method, "combining votes");

        if *method == CombineMethod::Boosting {
            return combine_boosted(&self.votes, self.offset.as_ref());
        }

        let classification = self.is_classification()?;
        match method {
            CombineMethod::Plurality if classification => self.plurality(),
            CombineMethod::ConfidenceWeighted if classification => self.confidence_weighted(),
            CombineMethod::ProbabilityWeighted if classification => self.probability_weighted(),
            CombineMethod::Threshold { threshold, category } if classification => {
                self.threshold(*threshold, category)
            }
            CombineMethod::Threshold { .. } => Err(CombineError::ClassificationOnly("threshold")),
            CombineMethod::ConfidenceWeighted => self.error_weighted(),
            _ => self.average(),
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Per-category weight totals in order of first appearance.
    fn tally(&self, weight: impl Fn(&Vote) -> f64) -> Vec<(String, f64)> {
        let mut tally: Vec<(String, f64)> = Vec::new();
        for vote in &self.votes {
            let Output::Category(category) = &vote.prediction.output else {
                continue;
            };
            let w = weight(vote);
            match tally.iter_mut().find(|(k, _)| k == category) {
                Some((_, total)) => *total += w,
                None => tally.push((category.clone(), w)),
            }
        }
        tally
    }

    /// Category with the largest total; ties go to the earliest vote.
    fn winner(tally: &[(String, f64)]) -> Result<String, CombineError> {
        let mut best: Option<&(String, f64)> = None;
        for entry in tally {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(k, _)| k.clone()).ok_or(CombineError::Empty)
    }

    fn confidences(&self) -> Result<Vec<f64>, CombineError> {
        self.votes
            .iter()
            .enumerate()
            .map(|(order, v)| {
                v.prediction
                    .confidence
                    .ok_or(CombineError::MissingConfidence { order })
            })
            .collect()
    }

    /// Sum of the class distributions of all votes, if every vote has one.
    fn combined_distribution(&self) -> Option<Vec<(String, f64)>> {
        self.votes.iter().try_fold(Vec::new(), |acc, v| {
            let d = v.prediction.distribution.as_ref()?.as_categories()?;
            Some(merge_distributions(&acc, d))
        })
    }

    /// Mean confidence of the winning votes, each weighted by `weight`.
    fn weighted_confidence(&self, winner: &str, weight: impl Fn(&Vote) -> f64) -> Option<f64> {
        let mut sum = 0.0;
        let mut total_weight = 0.0;
        for vote in self.votes.iter().filter(|v| v.prediction.output.as_category() == Some(winner)) {
            let w = weight(vote);
            sum += w * vote.prediction.confidence?;
            total_weight += w;
        }
        (total_weight > 0.0).then(|| sum / total_weight)
    }

    fn classification_prediction(&self, output: String, confidence: Option<f64>) -> Prediction {
        let distribution = self.combined_distribution();
        let count = match &distribution {
            Some(d) => total_count(d),
            None => self.votes.iter().map(|v| v.prediction.count).sum(),
        };
        Prediction {
            confidence,
            distribution: distribution.map(Distribution::Categories),
            distribution_unit: DistributionUnit::Categories,
            count,
            ..Prediction::from_output(Output::Category(output))
        }
    }

    fn plurality(&self) -> Result<Prediction, CombineError> {
        let winner = Self::winner(&self.tally(|_| 1.0))?;

        let all_confident = self.votes.iter().all(|v| v.prediction.confidence.is_some());
        let confidence = if all_confident {
            self.weighted_confidence(&winner, |_| 1.0)
        } else {
            self.combined_distribution().and_then(|d| {
                let n = total_count(&d);
                ws_confidence_with_n(&winner, &d, self.z.unwrap_or(DEFAULT_Z), Some(n))
            })
        };
        Ok(self.classification_prediction(winner, confidence))
    }

    fn confidence_weighted(&self) -> Result<Prediction, CombineError> {
        self.confidences()?;
        let confidence_of = |v: &Vote| v.prediction.confidence.unwrap_or_default();
        let winner = Self::winner(&self.tally(confidence_of))?;
        let confidence = self.weighted_confidence(&winner, confidence_of);
        Ok(self.classification_prediction(winner, confidence))
    }

    fn probability_weighted(&self) -> Result<Prediction, CombineError> {
        let mut summed: Vec<(String, f64)> = Vec::new();
        for (order, vote) in self.votes.iter().enumerate() {
            if vote
                .prediction
                .distribution
                .as_ref()
                .and_then(Distribution::as_categories)
                .is_none()
            {
                return Err(CombineError::MissingDistribution { order });
            }
            summed = merge_distributions(&summed, &vote.prediction.probabilities());
        }

        let n = self.votes.len() as f64;
        let averaged: Vec<(String, f64)> = summed.into_iter().map(|(k, p)| (k, p / n)).collect();
        let winner = Self::winner(&averaged)?;
        let confidence = averaged.iter().find(|(k, _)| *k == winner).map(|(_, p)| *p);

        Ok(Prediction {
            confidence,
            distribution: Some(Distribution::Categories(averaged)),
            distribution_unit: DistributionUnit::Categories,
            count: self.votes.iter().map(|v| v.prediction.count).sum(),
            ..Prediction::from_output(Output::Category(winner))
        })
    }

    fn threshold(&self, threshold: usize, category: &str) -> Result<Prediction, CombineError> {
        if threshold > self.votes.len() {
            return Err(CombineError::ThresholdTooLarge {
                threshold,
                votes: self.votes.len(),
            });
        }
        let predicts = |v: &Vote| v.prediction.output.as_category() == Some(category);
        let in_favour = self.votes.iter().filter(|v| predicts(*v)).count();

        let chosen = if in_favour >= threshold {
            self.subset(predicts)
        } else {
            self.subset(|v| !predicts(v))
        };
        chosen.plurality()
    }

    // =========================================================================
    // Regression
    // =========================================================================

    fn regression_prediction(&self, weights: &[f64]) -> Prediction {
        let total_weight: f64 = weights.iter().sum();
        let weighted_mean = |value: fn(&Prediction) -> Option<f64>| -> Option<f64> {
            let mut sum = 0.0;
            for (vote, w) in self.votes.iter().zip(weights) {
                sum += w * value(&vote.prediction)?;
            }
            (total_weight > 0.0).then(|| sum / total_weight)
        };

        let output = weighted_mean(|p| p.output.as_f64()).unwrap_or_default();
        let min = self
            .votes
            .iter()
            .filter_map(|v| v.prediction.min)
            .reduce(f64::min);
        let max = self
            .votes
            .iter()
            .filter_map(|v| v.prediction.max)
            .reduce(f64::max);

        Prediction {
            confidence: weighted_mean(|p| p.confidence),
            median: weighted_mean(|p| p.median),
            count: self.votes.iter().map(|v| v.prediction.count).sum(),
            min,
            max,
            ..Prediction::from_output(Output::Number(output))
        }
    }

    fn average(&self) -> Result<Prediction, CombineError> {
        Ok(self.regression_prediction(&vec![1.0; self.votes.len()]))
    }

    /// Mean weighted by error: errors are rescaled to `[0, 10]` and each
    /// vote weighs `exp(-scaled error)`.
    fn error_weighted(&self) -> Result<Prediction, CombineError> {
        let errors = self.confidences()?;
        let min_error = errors.iter().copied().fold(f64::INFINITY, f64::min);
        let max_error = errors.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max_error - min_error;

        let weights: Vec<f64> = if range > 0.0 {
            errors
                .iter()
                .map(|e| ((min_error - e) / range * ERROR_TOP_RANGE).exp())
                .collect()
        } else {
            vec![1.0; errors.len()]
        };
        Ok(self.regression_prediction(&weights))
    }
}

impl FromIterator<Prediction> for MultiVote {
    fn from_iter<T: IntoIterator<Item = Prediction>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(Vote::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn class_vote(output: &str, confidence: Option<f64>, dist: &[(&str, f64)]) -> Prediction {
        Prediction {
            confidence,
            distribution: Some(Distribution::Categories(
                dist.iter().map(|(k, c)| (k.to_string(), *c)).collect(),
            )),
            count: dist.iter().map(|(_, c)| c).sum(),
            ..Prediction::from_output(Output::Category(output.into()))
        }
    }

    fn reg_vote(output: f64, error: f64) -> Prediction {
        Prediction {
            confidence: Some(error),
            count: 10.0,
            min: Some(output - 1.0),
            max: Some(output + 1.0),
            median: Some(output),
            ..Prediction::from_output(Output::Number(output))
        }
    }

    fn three_classifiers() -> MultiVote {
        [
            class_vote("A", Some(0.6), &[("A", 6.0), ("B", 4.0)]),
            class_vote("A", Some(0.8), &[("A", 8.0), ("B", 2.0)]),
            class_vote("B", Some(0.9), &[("A", 1.0), ("B", 9.0)]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn plurality_picks_majority() {
        let p = three_classifiers().combine(&CombineMethod::Plurality).unwrap();
        assert_eq!(p.output, Output::Category("A".into()));
        assert_abs_diff_eq!(p.confidence.unwrap(), 0.7, epsilon = 1e-12);
        assert_eq!(p.count, 30.0);
        assert_eq!(
            p.distribution,
            Some(Distribution::Categories(vec![("A".into(), 15.0), ("B".into(), 15.0)]))
        );
    }

    #[test]
    fn plurality_ties_go_to_earliest_vote() {
        let votes: MultiVote = [
            class_vote("B", Some(0.5), &[("B", 1.0)]),
            class_vote("A", Some(0.5), &[("A", 1.0)]),
        ]
        .into_iter()
        .collect();
        let p = votes.combine(&CombineMethod::Plurality).unwrap();
        assert_eq!(p.output, Output::Category("B".into()));
    }

    #[test]
    fn plurality_without_confidences_uses_distribution() {
        let votes: MultiVote = [
            class_vote("A", None, &[("A", 4.0), ("B", 1.0)]),
            class_vote("A", None, &[("A", 4.0), ("B", 1.0)]),
        ]
        .into_iter()
        .collect();
        let p = votes.combine(&CombineMethod::Plurality).unwrap();
        let d = vec![("A".to_string(), 8.0), ("B".to_string(), 2.0)];
        assert_eq!(p.confidence, ws_confidence_with_n("A", &d, DEFAULT_Z, None));
    }

    #[test]
    fn confidence_weighted_can_overturn_majority() {
        let votes: MultiVote = [
            class_vote("A", Some(0.3), &[("A", 1.0)]),
            class_vote("A", Some(0.3), &[("A", 1.0)]),
            class_vote("B", Some(0.9), &[("B", 1.0)]),
        ]
        .into_iter()
        .collect();
        let p = votes.combine(&CombineMethod::ConfidenceWeighted).unwrap();
        assert_eq!(p.output, Output::Category("B".into()));
        assert_abs_diff_eq!(p.confidence.unwrap(), 0.9, epsilon = 1e-12);
    }

    #[test]
    fn probability_weighted_fills_absent_classes() {
        let votes: MultiVote = [
            class_vote("A", None, &[("A", 3.0), ("B", 1.0)]),
            class_vote("C", None, &[("C", 2.0)]),
        ]
        .into_iter()
        .collect();
        let p = votes.combine(&CombineMethod::ProbabilityWeighted).unwrap();

        assert_eq!(p.output, Output::Category("C".into()));
        assert_eq!(
            p.distribution,
            Some(Distribution::Categories(vec![
                ("A".into(), 0.375),
                ("B".into(), 0.125),
                ("C".into(), 0.5),
            ]))
        );
    }

    #[rstest]
    #[case(2, "B", "A")]
    #[case(1, "B", "B")]
    #[case(3, "A", "B")]
    #[case(2, "C", "A")]
    fn threshold_combination(#[case] threshold: usize, #[case] category: &str, #[case] expected: &str) {
        let method = CombineMethod::Threshold {
            threshold,
            category: category.into(),
        };
        let p = three_classifiers().combine(&method).unwrap();
        assert_eq!(p.output, Output::Category(expected.into()));
    }

    #[test]
    fn threshold_larger_than_votes_fails() {
        let method = CombineMethod::Threshold {
            threshold: 4,
            category: "A".into(),
        };
        assert_eq!(
            three_classifiers().combine(&method).unwrap_err(),
            CombineError::ThresholdTooLarge { threshold: 4, votes: 3 }
        );
    }

    #[test]
    fn regression_mean() {
        let votes: MultiVote = [reg_vote(1.0, 2.0), reg_vote(2.0, 4.0), reg_vote(6.0, 6.0)]
            .into_iter()
            .collect();
        let p = votes.combine(&CombineMethod::Plurality).unwrap();

        assert_eq!(p.output, Output::Number(3.0));
        assert_eq!(p.confidence, Some(4.0));
        assert_eq!(p.count, 30.0);
        assert_eq!((p.min, p.max), (Some(0.0), Some(7.0)));
    }

    #[test]
    fn regression_error_weighted() {
        let votes: MultiVote = [reg_vote(1.0, 1.0), reg_vote(5.0, 3.0)].into_iter().collect();
        let p = votes.combine(&CombineMethod::ConfidenceWeighted).unwrap();

        let w = (-10f64).exp();
        assert_abs_diff_eq!(p.output.as_f64().unwrap(), (1.0 + 5.0 * w) / (1.0 + w), epsilon = 1e-12);
        assert_abs_diff_eq!(p.confidence.unwrap(), (1.0 + 3.0 * w) / (1.0 + w), epsilon = 1e-12);
    }

    #[test]
    fn invalid_inputs() {
        assert_eq!(
            MultiVote::default().combine(&CombineMethod::Plurality).unwrap_err(),
            CombineError::Empty
        );

        let mixed: MultiVote = [class_vote("A", None, &[("A", 1.0)]), reg_vote(1.0, 1.0)]
            .into_iter()
            .collect();
        assert_eq!(
            mixed.combine(&CombineMethod::Plurality).unwrap_err(),
            CombineError::MixedOutputs
        );

        let unconfident: MultiVote = [
            class_vote("A", Some(0.5), &[("A", 1.0)]),
            class_vote("A", None, &[("A", 1.0)]),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            unconfident.combine(&CombineMethod::ConfidenceWeighted).unwrap_err(),
            CombineError::MissingConfidence { order: 1 }
        );
    }
}
