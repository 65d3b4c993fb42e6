//! Boosted-tree backends driven by the shared trial optimizer.

use std::collections::BTreeMap;

use lo_optimizer::{Candidate, OptimizationConfig, SearchSpace, TrialOptimizer};
use lo_types::{BackendKind, LoError, LoResult};
use tracing::info;

use super::{FittedBackend, Learner, TrainingBackend, TrainingTask};
use crate::boosting::trainer::EARLY_STOPPING_PATIENCE;
use crate::boosting::{BoostedModel, BoostingParams, GrowthStrategy, ImportanceKind, Objective};
use crate::encoding::FeatureMatrix;
use crate::metrics::evaluate;

/// Tree-growth family behind a boosted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeFamily {
    /// Level-by-level growth with a depth cap.
    DepthWise,
    /// Best-first growth with a leaf budget.
    LeafWise,
    /// Symmetric trees sharing one split per level.
    Oblivious,
}

impl TreeFamily {
    pub fn backend_kind(&self) -> BackendKind {
        match self {
            Self::DepthWise => BackendKind::GbtA,
            Self::LeafWise => BackendKind::GbtB,
            Self::Oblivious => BackendKind::GbtC,
        }
    }

    pub fn importance_kind(&self) -> ImportanceKind {
        match self {
            Self::DepthWise => ImportanceKind::Gain,
            Self::LeafWise => ImportanceKind::SplitCount,
            Self::Oblivious => ImportanceKind::GainPercent,
        }
    }

    /// Hyperparameters searched by the trial optimizer for this family.
    pub fn search_space(&self) -> SearchSpace {
        match self {
            Self::DepthWise => SearchSpace::new()
                .stepped_integer("n_estimators", 100, 1000, 50)
                .integer("max_depth", 3, 10)
                .log_real("learning_rate", 0.01, 0.3)
                .real("subsample", 0.8, 1.0)
                .real("colsample_bytree", 0.8, 1.0),
            Self::LeafWise => Self::DepthWise.search_space().log_integer("num_leaves", 10, 300),
            Self::Oblivious => SearchSpace::new()
                .stepped_integer("iterations", 100, 1000, 50)
                .integer("depth", 4, 10)
                .log_real("learning_rate", 0.01, 0.3)
                .log_real("l2_leaf_reg", 1.0, 10.0)
                .integer("border_count", 32, 255),
        }
    }

    /// Boosting parameters for one candidate; absent keys fall back to defaults.
    pub fn boosting_params(&self, candidate: &Candidate, seed: u64, early_stopping: bool) -> BoostingParams {
        let int = |name: &str, default: i64| {
            candidate
                .get(name)
                .and_then(|v| v.as_i64())
                .unwrap_or(default)
                .max(1) as usize
        };
        let float = |name: &str, default: f64| {
            candidate
                .get(name)
                .and_then(|v| v.as_f64())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };
        let early_stopping_rounds = early_stopping.then_some(EARLY_STOPPING_PATIENCE);

        match self {
            Self::DepthWise | Self::LeafWise => {
                let growth = if *self == Self::DepthWise {
                    GrowthStrategy::DepthWise {
                        max_depth: int("max_depth", 6),
                    }
                } else {
                    GrowthStrategy::LeafWise {
                        num_leaves: int("num_leaves", 31).max(2),
                        max_depth: candidate
                            .get("max_depth")
                            .and_then(|v| v.as_i64())
                            .map(|d| d.max(1) as usize),
                    }
                };
                BoostingParams {
                    n_rounds: int("n_estimators", 100),
                    learning_rate: float("learning_rate", 0.1),
                    growth,
                    subsample: float("subsample", 1.0).clamp(0.05, 1.0),
                    colsample: float("colsample_bytree", 1.0).clamp(0.05, 1.0),
                    lambda: 1.0,
                    max_bins: 255,
                    early_stopping_rounds,
                    seed,
                    ..BoostingParams::default()
                }
            }
            Self::Oblivious => BoostingParams {
                n_rounds: int("iterations", 500),
                learning_rate: float("learning_rate", 0.05),
                growth: GrowthStrategy::Oblivious {
                    depth: int("depth", 6),
                },
                lambda: float("l2_leaf_reg", 3.0).max(0.0),
                max_bins: int("border_count", 254),
                early_stopping_rounds,
                seed,
                ..BoostingParams::default()
            },
        }
    }

    pub(crate) fn fit_learner(
        &self,
        x: &FeatureMatrix,
        y: &[f64],
        n_classes: usize,
        params: &BoostingParams,
    ) -> LoResult<Learner> {
        let model = BoostedModel::fit(x, y, Objective::for_task(n_classes), params)?;
        Ok(Learner::Boosted {
            model,
            importance: self.importance_kind(),
        })
    }
}

pub(crate) fn candidate_json(candidate: &Candidate) -> BTreeMap<String, serde_json::Value> {
    candidate
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

/// A boosted-tree backend: trial search, then one final fit.
#[derive(Debug, Clone)]
pub struct GbtBackend {
    family: TreeFamily,
}

impl GbtBackend {
    pub fn new(family: TreeFamily) -> Self {
        Self { family }
    }

    pub fn family(&self) -> TreeFamily {
        self.family
    }
}

impl TrainingBackend for GbtBackend {
    fn kind(&self) -> BackendKind {
        self.family.backend_kind()
    }

    fn accepts_categorical(&self) -> bool {
        self.family == TreeFamily::Oblivious
    }

    fn fit(&self, task: &TrainingTask<'_>) -> LoResult<FittedBackend> {
        let backend = self.kind().name();
        let config = task.config;
        let seed = config.random_seed;

        let optimizer = TrialOptimizer::new(
            OptimizationConfig::new(config.trial_count, seed).with_time_budget(config.time_budget()),
        );
        let space = self.family.search_space();

        let outcome = optimizer
            .optimize(&space, |candidate| {
                let params = self.family.boosting_params(candidate, seed, config.early_stopping);
                let learner = self.family.fit_learner(task.train_x, task.train_y, task.n_classes, &params)?;
                let predictions = learner.predict(task.test_x)?;
                Ok(evaluate(task.problem_type, task.test_y, &predictions)?.objective)
            })
            .map_err(|e| LoError::backend_failed(backend, e))?;

        let params = self
            .family
            .boosting_params(&outcome.best_candidate, seed, config.early_stopping);
        let learner = self
            .family
            .fit_learner(task.train_x, task.train_y, task.n_classes, &params)
            .map_err(|e| LoError::backend_failed(backend, e))?;

        info!(
            backend,
            trials = outcome.trials.len(),
            best_trial = outcome.best_trial,
            best_objective = outcome.best_objective,
            stopped_by_budget = outcome.stopped_by_budget,
            "backend search finished"
        );

        Ok(FittedBackend {
            learner,
            params: candidate_json(&outcome.best_candidate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lo_optimizer::ParameterValue;
    use lo_types::{Metric, ProblemType, TrainingConfig};

    #[test]
    fn search_spaces_have_expected_dimensions() {
        let names = |family: TreeFamily| -> Vec<String> {
            family
                .search_space()
                .names()
                .into_iter()
                .map(String::from)
                .collect()
        };
        assert_eq!(
            names(TreeFamily::DepthWise),
            ["n_estimators", "max_depth", "learning_rate", "subsample", "colsample_bytree"]
        );
        assert!(names(TreeFamily::LeafWise).contains(&"num_leaves".to_string()));
        assert_eq!(
            names(TreeFamily::Oblivious),
            ["iterations", "depth", "learning_rate", "l2_leaf_reg", "border_count"]
        );
        for family in [TreeFamily::DepthWise, TreeFamily::LeafWise, TreeFamily::Oblivious] {
            assert!(family.search_space().validate().is_ok(), "{family:?}");
        }
    }

    #[test]
    fn candidate_maps_to_boosting_params() {
        let mut candidate = Candidate::new();
        candidate.insert("num_leaves".into(), ParameterValue::Integer(40));
        candidate.insert("max_depth".into(), ParameterValue::Integer(5));
        candidate.insert("n_estimators".into(), ParameterValue::Integer(150));
        candidate.insert("learning_rate".into(), ParameterValue::Real(0.2));

        let params = TreeFamily::LeafWise.boosting_params(&candidate, 3, true);
        assert_eq!(params.n_rounds, 150);
        assert_eq!(params.learning_rate, 0.2);
        assert_eq!(
            params.growth,
            GrowthStrategy::LeafWise {
                num_leaves: 40,
                max_depth: Some(5)
            }
        );
        assert!(params.early_stopping_rounds.is_some());

        let params = TreeFamily::Oblivious.boosting_params(&Candidate::new(), 3, false);
        assert_eq!(params.growth, GrowthStrategy::Oblivious { depth: 6 });
        assert_eq!(params.early_stopping_rounds, None);
    }

    #[test]
    fn fit_returns_winning_params() {
        let n = 60;
        let x0: Vec<f64> = (0..n).map(|i| (i % 10) as f64).collect();
        let y: Vec<f64> = x0.iter().map(|v| 2.0 * v + 1.0).collect();
        let x = FeatureMatrix::new(vec!["x0".into()], vec![x0], n).unwrap();
        let config = TrainingConfig::new(ProblemType::Regression)
            .with_trial_count(2)
            .with_time_budget_secs(30);

        let task = TrainingTask {
            problem_type: ProblemType::Regression,
            n_classes: 0,
            train_x: &x,
            train_y: &y,
            test_x: &x,
            test_y: &y,
            config: &config,
            metric: Metric::R2,
        };

        let fitted = GbtBackend::new(TreeFamily::DepthWise).fit(&task).unwrap();
        assert!(fitted.params.contains_key("n_estimators"));
        assert!(fitted.params.contains_key("max_depth"));
        assert_eq!(fitted.learner.predict(&x).unwrap().len(), n);
    }
}
