//! Ensemble of tree models combined by vote.

use std::borrow::Cow;

use crate::ensemble::{CombineError, CombineMethod, InitialOffset, MultiVote};
use crate::inference::Prediction;
use crate::repr::InputRecord;
use crate::utils::Parallelism;

use super::config::PredictConfig;
use super::tree_model::TreeModel;

/// Errors raised by ensemble prediction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("ensemble has no models")]
    EmptyEnsemble,
    #[error("ensemble mixes boosted and plain trees")]
    MixedBoosting,
    #[error(transparent)]
    Combine(#[from] CombineError),
}

/// Ordered collection of tree models.
///
/// Boosted ensembles (every member carries boosting options) always combine
/// with [`CombineMethod::Boosting`]; other ensembles use the configured
/// method.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    models: Vec<TreeModel>,
    offset: Option<InitialOffset>,
}

impl Ensemble {
    pub fn from_models(models: Vec<TreeModel>) -> Result<Self, ModelError> {
        if models.is_empty() {
            return Err(ModelError::EmptyEnsemble);
        }
        let boosted = models.iter().filter(|m| m.boosting().is_some()).count();
        if boosted != 0 && boosted != models.len() {
            return Err(ModelError::MixedBoosting);
        }
        Ok(Self {
            models,
            offset: None,
        })
    }

    /// Initial score of a boosted ensemble.
    pub fn with_offset(mut self, offset: InitialOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn offset(&self) -> Option<&InitialOffset> {
        self.offset.as_ref()
    }

    pub fn models(&self) -> &[TreeModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    #[inline]
    pub fn is_boosted(&self) -> bool {
        self.models.iter().all(|m| m.boosting().is_some())
    }

    /// One vote per member, in member order.
    pub fn votes(&self, record: &InputRecord, config: &PredictConfig) -> MultiVote {
        let votes = self.models.iter().map(|m| m.vote(record, config)).collect();
        let multivote = MultiVote::new(votes).with_z(config.z);
        match &self.offset {
            Some(offset) => multivote.with_offset(offset.clone()),
            None => multivote,
        }
    }

    /// Combination method used for this ensemble under `config`.
    pub fn combine_method<'a>(&self, config: &'a PredictConfig) -> Cow<'a, CombineMethod> {
        if self.is_boosted() {
            Cow::Owned(CombineMethod::Boosting)
        } else {
            Cow::Borrowed(&config.combine_method)
        }
    }

    pub fn predict(&self, record: &InputRecord, config: &PredictConfig) -> Result<Prediction, ModelError> {
        let method = self.combine_method(config);
        Ok(self.votes(record, config).combine(&method)?)
    }

    /// Predict many records; the output order matches `records`.
    pub fn predict_batch(
        &self,
        records: &[InputRecord],
        config: &PredictConfig,
        parallelism: Parallelism,
    ) -> Result<Vec<Prediction>, ModelError> {
        parallelism
            .maybe_par_map(records, |record| self.predict(record, config))
            .into_iter()
            .collect()
    }
}
