//! Budgeted search across learner families.
//!
//! Every learner starts from a cheap configuration. After each learner has
//! been scored once, two out of three evaluations go to the learner with the
//! best score so far and the third cycles through all learners. Within a
//! learner the search is a randomized direct search in a normalised `[0, 1]^d`
//! space: try a random direction, then its opposite, shrink the step on
//! failure and restart from a random point once the step becomes negligible.
//!
//! Selection uses the configured metric on an inner hold-out carved from the
//! training partition; the winner is refit on the whole training partition.

use std::time::Instant;

use lo_data::train_test_split;
use lo_optimizer::{Candidate, ParameterValue, SearchSpace};
use lo_types::{BackendKind, LoError, LoResult, Metric};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::gbt::{candidate_json, TreeFamily};
use super::{FittedBackend, Learner, TrainingBackend, TrainingTask};
use crate::encoding::FeatureMatrix;
use crate::linear::RidgeModel;
use crate::metrics::metric_value;

const INNER_HOLDOUT_FRACTION: f64 = 0.2;
const INITIAL_STEP: f64 = 0.1;
const STEP_SHRINK: f64 = 0.7;
const MIN_STEP: f64 = 0.01;
const MIN_PATIENCE: usize = 10;

/// Learner families explored by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Estimator {
    Trees(TreeFamily),
    Ridge,
}

impl Estimator {
    const ALL: [Estimator; 4] = [
        Self::Trees(TreeFamily::DepthWise),
        Self::Trees(TreeFamily::LeafWise),
        Self::Trees(TreeFamily::Oblivious),
        Self::Ridge,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Trees(TreeFamily::DepthWise) => "depth_wise_trees",
            Self::Trees(TreeFamily::LeafWise) => "leaf_wise_trees",
            Self::Trees(TreeFamily::Oblivious) => "oblivious_trees",
            Self::Ridge => "ridge",
        }
    }

    /// Wider than the gbt backends' spaces, starting from the cheapest corner.
    fn space(&self) -> SearchSpace {
        match self {
            Self::Trees(TreeFamily::DepthWise) => SearchSpace::new()
                .log_integer("n_estimators", 4, 512)
                .starting_at(4_i64)
                .integer("max_depth", 2, 10)
                .starting_at(3_i64)
                .log_real("learning_rate", 0.01, 1.0)
                .starting_at(0.1)
                .real("subsample", 0.6, 1.0)
                .starting_at(1.0)
                .real("colsample_bytree", 0.6, 1.0)
                .starting_at(1.0),
            Self::Trees(TreeFamily::LeafWise) => SearchSpace::new()
                .log_integer("n_estimators", 4, 512)
                .starting_at(4_i64)
                .log_integer("num_leaves", 4, 256)
                .starting_at(4_i64)
                .log_real("learning_rate", 0.01, 1.0)
                .starting_at(0.1)
                .real("subsample", 0.6, 1.0)
                .starting_at(1.0)
                .real("colsample_bytree", 0.6, 1.0)
                .starting_at(1.0),
            Self::Trees(TreeFamily::Oblivious) => SearchSpace::new()
                .log_integer("iterations", 8, 512)
                .starting_at(8_i64)
                .integer("depth", 2, 8)
                .starting_at(3_i64)
                .log_real("learning_rate", 0.01, 1.0)
                .starting_at(0.1)
                .log_real("l2_leaf_reg", 1.0, 10.0)
                .starting_at(3.0),
            Self::Ridge => SearchSpace::new().log_real("alpha", 1e-4, 100.0).starting_at(1.0),
        }
    }

    fn fit(&self, candidate: &Candidate, x: &FeatureMatrix, y: &[f64], task: &TrainingTask<'_>) -> LoResult<Learner> {
        match self {
            Self::Trees(family) => {
                let params = family.boosting_params(candidate, task.config.random_seed, task.config.early_stopping);
                family.fit_learner(x, y, task.n_classes, &params)
            }
            Self::Ridge => {
                let alpha = candidate.get("alpha").and_then(|v| v.as_f64()).unwrap_or(1.0);
                Ok(Learner::Ridge {
                    model: RidgeModel::fit(x, y, task.n_classes, alpha)?,
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Phase {
    /// The starting point has not been scored.
    Start,
    /// Waiting for the score of `current + step * direction`.
    Forward(Vec<f64>),
    /// Waiting for the score of `current - step * direction`.
    Backward(Vec<f64>),
}

/// Local search state of one learner.
#[derive(Debug, Clone)]
struct LocalSearch {
    estimator: Estimator,
    space: SearchSpace,
    current: Vec<f64>,
    current_score: f64,
    step: f64,
    phase: Phase,
    best_score: f64,
    best_point: Vec<f64>,
}

impl LocalSearch {
    fn new(estimator: Estimator) -> Self {
        let space = estimator.space();
        let init = space.start_point();
        Self {
            estimator,
            space,
            best_point: init.clone(),
            current: init,
            current_score: f64::NEG_INFINITY,
            step: INITIAL_STEP,
            phase: Phase::Start,
            best_score: f64::NEG_INFINITY,
        }
    }

    fn offset(&self, direction: &[f64], sign: f64) -> Vec<f64> {
        self.current
            .iter()
            .zip(direction)
            .map(|(c, d)| (c + sign * self.step * d).clamp(0.0, 1.0))
            .collect()
    }

    /// Next point to evaluate.
    fn propose(&self) -> Vec<f64> {
        match &self.phase {
            Phase::Start => self.current.clone(),
            Phase::Forward(direction) => self.offset(direction, 1.0),
            Phase::Backward(direction) => self.offset(direction, -1.0),
        }
    }

    /// Record the score of the last proposal; `None` marks a failed fit.
    fn observe(&mut self, point: Vec<f64>, score: Option<f64>, rng: &mut ChaCha8Rng) {
        let score = score.filter(|s| s.is_finite()).unwrap_or(f64::NEG_INFINITY);
        if score > self.best_score {
            self.best_score = score;
            self.best_point = point.clone();
        }

        let phase = std::mem::replace(&mut self.phase, Phase::Start);
        self.phase = match phase {
            Phase::Start => {
                self.current = point;
                self.current_score = score;
                Phase::Forward(random_direction(self.current.len(), rng))
            }
            _ if score > self.current_score => {
                self.current = point;
                self.current_score = score;
                Phase::Forward(random_direction(self.current.len(), rng))
            }
            Phase::Forward(direction) => Phase::Backward(direction),
            Phase::Backward(_) => {
                self.step *= STEP_SHRINK;
                if self.step < MIN_STEP {
                    self.step = INITIAL_STEP;
                    self.current = (0..self.current.len()).map(|_| rng.random::<f64>()).collect();
                    Phase::Start
                } else {
                    Phase::Forward(random_direction(self.current.len(), rng))
                }
            }
        };
    }
}

fn random_direction(dims: usize, rng: &mut ChaCha8Rng) -> Vec<f64> {
    loop {
        let v: Vec<f64> = (0..dims).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect();
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 1e-9 {
            return v.into_iter().map(|x| x / norm).collect();
        }
    }
}

/// Learner-family search with its own budget and hold-out.
#[derive(Debug, Clone, Default)]
pub struct MetaSearchBackend;

impl MetaSearchBackend {
    pub fn new() -> Self {
        Self
    }
}

struct InnerSplit {
    fit_x: FeatureMatrix,
    fit_y: Vec<f64>,
    valid_x: FeatureMatrix,
    valid_y: Vec<f64>,
}

fn inner_split(task: &TrainingTask<'_>) -> InnerSplit {
    match train_test_split(task.train_x.n_rows(), INNER_HOLDOUT_FRACTION, task.config.random_seed) {
        Ok(split) => InnerSplit {
            fit_x: task.train_x.take_rows(&split.train),
            fit_y: split.train.iter().map(|&i| task.train_y[i]).collect(),
            valid_x: task.train_x.take_rows(&split.test),
            valid_y: split.test.iter().map(|&i| task.train_y[i]).collect(),
        },
        Err(e) => {
            warn!(error = %e, "training partition too small for an inner hold-out, scoring in-sample");
            InnerSplit {
                fit_x: task.train_x.clone(),
                fit_y: task.train_y.to_vec(),
                valid_x: task.train_x.clone(),
                valid_y: task.train_y.to_vec(),
            }
        }
    }
}

fn score(
    estimator: Estimator,
    candidate: &Candidate,
    data: &InnerSplit,
    task: &TrainingTask<'_>,
    metric: Metric,
) -> LoResult<f64> {
    let learner = estimator.fit(candidate, &data.fit_x, &data.fit_y, task)?;
    let predictions = learner.predict(&data.valid_x)?;
    Ok(metric.to_score(metric_value(metric, &data.valid_y, &predictions)?))
}

impl TrainingBackend for MetaSearchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MetaSearch
    }

    fn accepts_categorical(&self) -> bool {
        true
    }

    fn fit(&self, task: &TrainingTask<'_>) -> LoResult<FittedBackend> {
        let backend = self.kind().name();
        let config = task.config;
        let budget = config.time_budget();
        let metric = task.metric;
        let data = inner_split(task);

        let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        let mut searches: Vec<LocalSearch> = Estimator::ALL.into_iter().map(LocalSearch::new).collect();
        let patience = MIN_PATIENCE.max(3 * searches.len());

        let started = Instant::now();
        let mut best: Option<(usize, Vec<f64>, f64)> = None;
        let mut since_improvement = 0;
        let mut round_robin = 0;
        let mut last_error = None;
        let mut evaluations = 0;

        while evaluations < config.trial_count {
            if evaluations > 0 && started.elapsed() >= budget {
                info!(backend, evaluations, "time budget exhausted, stopping search");
                break;
            }
            if config.early_stopping && since_improvement >= patience {
                debug!(backend, evaluations, patience, "no improvement, stopping search");
                break;
            }

            let idx = if evaluations < searches.len() {
                evaluations
            } else if evaluations % 3 != 2 {
                searches
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(bi, bs), (i, s)| {
                        if s.best_score > bs {
                            (i, s.best_score)
                        } else {
                            (bi, bs)
                        }
                    })
                    .0
            } else {
                round_robin = (round_robin + 1) % searches.len();
                round_robin
            };

            let search = &mut searches[idx];
            let point = search.propose();
            let candidate = search.space.candidate_at(&point);
            let result = score(search.estimator, &candidate, &data, task, metric);

            let value = match result {
                Ok(value) if value.is_finite() => Some(value),
                Ok(value) => {
                    last_error = Some(format!("score is not finite: {value}"));
                    None
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    None
                }
            };

            debug!(
                backend,
                evaluation = evaluations,
                estimator = search.estimator.name(),
                score = ?value,
                "meta search evaluation"
            );

            match value {
                Some(v) if best.as_ref().map_or(true, |(_, _, b)| v > *b) => {
                    best = Some((idx, point.clone(), v));
                    since_improvement = 0;
                }
                _ => since_improvement += 1,
            }
            search.observe(point, value, &mut rng);
            evaluations += 1;
        }

        let Some((idx, point, best_score)) = best else {
            return Err(LoError::backend_failed(
                backend,
                LoError::NoViableTrial {
                    attempted: evaluations,
                    last_error,
                },
            ));
        };

        let estimator = searches[idx].estimator;
        let mut candidate = searches[idx].space.candidate_at(&point);
        let learner = estimator
            .fit(&candidate, task.train_x, task.train_y, task)
            .map_err(|e| LoError::backend_failed(backend, e))?;

        info!(
            backend,
            evaluations,
            estimator = estimator.name(),
            metric = metric.name(),
            best_score,
            "meta search finished"
        );

        candidate.insert("estimator".to_string(), ParameterValue::from(estimator.name()));
        Ok(FittedBackend {
            learner,
            params: candidate_json(&candidate),
        })
    }
}
