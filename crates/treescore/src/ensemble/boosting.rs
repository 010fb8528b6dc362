//! Combination of boosted-tree votes.

use serde::{Deserialize, Serialize};

use crate::inference::{Distribution, Output, Prediction};
use crate::repr::DistributionUnit;

use super::multivote::{CombineError, Vote};

/// Boosting attributes of one ensemble member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingWeight {
    /// Fixed weight of the member's iteration.
    pub weight: f64,
    /// Class the member scores, for classification ensembles.
    #[serde(default)]
    pub objective_class: Option<String>,
}

/// Initial score of a boosted ensemble before any tree is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialOffset {
    Regression(f64),
    Classes(Vec<(String, f64)>),
}

impl Default for InitialOffset {
    fn default() -> Self {
        Self::Regression(0.0)
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Sum the weighted outputs of boosted votes.
///
/// Regression returns the sum plus the offset. Classification scores each
/// class separately; two classes go through a sigmoid, more through a
/// softmax, and the scores are renormalized into probabilities.
pub(super) fn combine_boosted(
    votes: &[Vote],
    offset: Option<&InitialOffset>,
) -> Result<Prediction, CombineError> {
    let mut weighted = Vec::with_capacity(votes.len());
    for (order, vote) in votes.iter().enumerate() {
        let boosting = vote.boosting.as_ref().ok_or(CombineError::MissingBoosting { order })?;
        let output = vote
            .prediction
            .output
            .as_f64()
            .ok_or(CombineError::MixedOutputs)?;
        weighted.push((boosting.objective_class.as_deref(), boosting.weight * output));
    }

    let classification = weighted.iter().any(|(class, _)| class.is_some());
    if classification && weighted.iter().any(|(class, _)| class.is_none()) {
        return Err(CombineError::MixedOutputs);
    }
    let count = votes.iter().map(|v| v.prediction.count).sum();

    if !classification {
        let base = match offset {
            Some(InitialOffset::Regression(base)) => *base,
            _ => 0.0,
        };
        let sum = base + weighted.iter().map(|(_, w)| w).sum::<f64>();
        return Ok(Prediction {
            count,
            ..Prediction::from_output(Output::Number(sum))
        });
    }

    let mut scores: Vec<(String, f64)> = match offset {
        Some(InitialOffset::Classes(classes)) => classes.clone(),
        _ => Vec::new(),
    };
    for (class, contribution) in weighted {
        let Some(class) = class else { continue };
        match scores.iter_mut().find(|(k, _)| k == class) {
            Some((_, score)) => *score += contribution,
            None => scores.push((class.to_string(), contribution)),
        }
    }

    let probabilities = if scores.len() == 2 {
        scores.iter().map(|(_, s)| sigmoid(*s)).collect::<Vec<_>>()
    } else {
        let max = scores.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
        scores.iter().map(|(_, s)| (s - max).exp()).collect()
    };
    let total: f64 = probabilities.iter().sum();
    let distribution: Vec<(String, f64)> = scores
        .into_iter()
        .zip(probabilities)
        .map(|((class, _), p)| (class, if total > 0.0 { p / total } else { 0.0 }))
        .collect();

    let mut winner: Option<&(String, f64)> = None;
    for entry in &distribution {
        if winner.map_or(true, |w| entry.1 > w.1) {
            winner = Some(entry);
        }
    }
    let (output, probability) = winner.cloned().ok_or(CombineError::Empty)?;

    Ok(Prediction {
        confidence: Some(probability),
        distribution: Some(Distribution::Categories(distribution)),
        distribution_unit: DistributionUnit::Categories,
        count,
        ..Prediction::from_output(Output::Category(output))
    })
}
