//! Fitted artifacts and their persisted form.

use chrono::{DateTime, Utc};
use lo_types::{BackendKind, Dataset, LoResult, ModelResult, Predictions, ProblemType};
use serde::{Deserialize, Serialize};

use crate::backends::Learner;
use crate::encoding::{FeatureEncoder, TargetEncoder};

/// Everything needed to predict from raw feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub backend: BackendKind,
    pub problem_type: ProblemType,
    pub feature_encoder: FeatureEncoder,
    pub target_encoder: TargetEncoder,
    pub learner: Learner,
}

impl Artifact {
    /// Predict for every row of `features`. Columns beyond the fitted ones are
    /// ignored, so the target may still be present.
    pub fn predict(&self, features: &Dataset) -> LoResult<Predictions> {
        let x = self.feature_encoder.transform(features)?;
        let raw = self.learner.predict(&x)?;
        Ok(self.target_encoder.decode(&raw))
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.feature_encoder.feature_names()
    }
}

/// On-disk record for one model id: the artifact plus its training result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub model_id: String,
    pub artifact: Artifact,
    pub result: ModelResult,
    pub saved_at: DateTime<Utc>,
}

impl PersistedModel {
    pub fn new(model_id: impl Into<String>, artifact: Artifact, result: ModelResult) -> Self {
        Self {
            model_id: model_id.into(),
            artifact,
            result,
            saved_at: Utc::now(),
        }
    }
}
