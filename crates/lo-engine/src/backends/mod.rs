//! Training backends.
//!
//! Every backend turns a prepared [`TrainingTask`] into a fitted [`Learner`]
//! plus the hyperparameters it settled on. The set of backends is closed:
//! [`backend_for`] maps each [`BackendKind`] to its implementation.

use std::collections::BTreeMap;

use lo_types::{BackendKind, LoResult, Metric, ProblemType, TrainingConfig};
use serde::{Deserialize, Serialize};

use crate::boosting::{BoostedModel, ImportanceKind};
use crate::encoding::FeatureMatrix;
use crate::linear::RidgeModel;

pub mod gbt;
pub mod meta_search;

pub use gbt::{GbtBackend, TreeFamily};
pub use meta_search::MetaSearchBackend;

/// Encoded train and held-out partitions for one training call.
#[derive(Debug, Clone, Copy)]
pub struct TrainingTask<'a> {
    pub problem_type: ProblemType,
    /// 0 for regression.
    pub n_classes: usize,
    pub train_x: &'a FeatureMatrix,
    pub train_y: &'a [f64],
    pub test_x: &'a FeatureMatrix,
    pub test_y: &'a [f64],
    pub config: &'a TrainingConfig,
    /// Resolved selection metric.
    pub metric: Metric,
}

/// A fitted model in encoded space: predicts values or class indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Learner {
    Boosted {
        model: BoostedModel,
        importance: ImportanceKind,
    },
    Ridge {
        model: RidgeModel,
    },
}

impl Learner {
    pub fn predict(&self, x: &FeatureMatrix) -> LoResult<Vec<f64>> {
        match self {
            Self::Boosted { model, .. } => model.predict(x),
            Self::Ridge { model } => model.predict(x),
        }
    }

    /// Empty for learners without a notion of importance.
    pub fn importances(&self, feature_names: &[String]) -> BTreeMap<String, f64> {
        match self {
            Self::Boosted { model, importance } => model.importances(feature_names, *importance),
            Self::Ridge { .. } => BTreeMap::new(),
        }
    }
}

/// Output of [`TrainingBackend::fit`].
#[derive(Debug, Clone)]
pub struct FittedBackend {
    pub learner: Learner,
    pub params: BTreeMap<String, serde_json::Value>,
}

pub trait TrainingBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether text feature columns may be ordinal-encoded for this backend.
    fn accepts_categorical(&self) -> bool;

    /// Search hyperparameters and fit the final learner on the training partition.
    fn fit(&self, task: &TrainingTask<'_>) -> LoResult<FittedBackend>;

    fn predict(&self, learner: &Learner, x: &FeatureMatrix) -> LoResult<Vec<f64>> {
        learner.predict(x)
    }

    fn importances(&self, learner: &Learner, feature_names: &[String]) -> BTreeMap<String, f64> {
        learner.importances(feature_names)
    }
}

pub fn backend_for(kind: BackendKind) -> Box<dyn TrainingBackend> {
    match kind {
        BackendKind::MetaSearch => Box::new(MetaSearchBackend::new()),
        BackendKind::GbtA => Box::new(GbtBackend::new(TreeFamily::DepthWise)),
        BackendKind::GbtB => Box::new(GbtBackend::new(TreeFamily::LeafWise)),
        BackendKind::GbtC => Box::new(GbtBackend::new(TreeFamily::Oblivious)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_backend() {
        for kind in BackendKind::ALL {
            let backend = backend_for(kind);
            assert_eq!(backend.kind(), kind);
        }
        assert!(!backend_for(BackendKind::GbtA).accepts_categorical());
        assert!(!backend_for(BackendKind::GbtB).accepts_categorical());
        assert!(backend_for(BackendKind::GbtC).accepts_categorical());
        assert!(backend_for(BackendKind::MetaSearch).accepts_categorical());
    }

    #[test]
    fn ridge_learner_has_no_importances() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0, 2.0, 3.0]], 3).unwrap();
        let model = RidgeModel::fit(&x, &[1.0, 2.0, 3.0], 0, 1.0).unwrap();
        let learner = Learner::Ridge { model };
        assert!(learner.importances(x.names()).is_empty());
        assert_eq!(learner.predict(&x).unwrap().len(), 3);
    }
}
