//! The gradient boosting loop.

use std::collections::BTreeMap;

use lo_types::{validation_error, LoResult};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binning::BinMapper;
use super::grower::{grow, GrowthStrategy};
use super::loss::Objective;
use super::split::{GainParams, SplitContext};
use super::tree::Tree;
use crate::encoding::FeatureMatrix;

/// Fits below this size never carve out an early-stopping holdout.
pub const EARLY_STOPPING_MIN_ROWS: usize = 20;
pub const EARLY_STOPPING_FRACTION: f64 = 0.1;
pub const EARLY_STOPPING_PATIENCE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub growth: GrowthStrategy,
    /// Bernoulli row sampling rate per round.
    pub subsample: f64,
    /// Fraction of features sampled per tree.
    pub colsample: f64,
    pub lambda: f64,
    pub min_child_weight: f64,
    /// Upper bound on split thresholds per feature.
    pub max_bins: usize,
    /// Stop after this many rounds without holdout improvement.
    pub early_stopping_rounds: Option<usize>,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            growth: GrowthStrategy::DepthWise { max_depth: 6 },
            subsample: 1.0,
            colsample: 1.0,
            lambda: 1.0,
            min_child_weight: 1e-3,
            max_bins: 63,
            early_stopping_rounds: None,
            seed: 0,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> LoResult<()> {
        if self.n_rounds == 0 {
            return Err(validation_error!("n_rounds must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(validation_error!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        for (name, value) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(validation_error!("{name} must lie in (0, 1], got {value}"));
            }
        }
        if self.lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(validation_error!("regularisation terms must be non-negative"));
        }
        Ok(())
    }
}

/// How split statistics are turned into feature importances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceKind {
    /// Total gain, normalised to sum to 1.
    Gain,
    /// Number of splits using the feature.
    SplitCount,
    /// Share of total gain, scaled to sum to 100.
    GainPercent,
}

/// A fitted ensemble: `trees[round][output]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedModel {
    objective: Objective,
    base_score: Vec<f64>,
    trees: Vec<Vec<Tree>>,
    n_features: usize,
}

impl BoostedModel {
    /// Fit on every row of `x`; `y` holds regression targets or class indices.
    pub fn fit(x: &FeatureMatrix, y: &[f64], objective: Objective, params: &BoostingParams) -> LoResult<Self> {
        params.validate()?;
        let n = x.n_rows();
        if n == 0 || y.len() != n {
            return Err(validation_error!(
                "cannot boost on {n} feature rows and {} targets",
                y.len()
            ));
        }
        if let Some(i) = y.iter().position(|v| !v.is_finite()) {
            return Err(validation_error!("target {i} is not finite"));
        }
        if (0..x.n_features()).all(|f| x.column(f).iter().all(|v| v.is_nan())) {
            return Err(validation_error!("no feature has an observed value"));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let (fit_rows, valid_rows) = holdout_rows(n, params, &mut rng);

        let mapper = BinMapper::fit(x, &fit_rows, params.max_bins);
        let binned = mapper.transform(x);
        let gain_params = GainParams {
            lambda: params.lambda,
            min_child_weight: params.min_child_weight,
        };

        let n_outputs = objective.n_outputs();
        let base_score = objective.base_score(y, &fit_rows);
        let mut raw: Vec<Vec<f64>> = base_score.iter().map(|&b| vec![b; n]).collect();
        let mut grad = vec![vec![0.0; n]; n_outputs];
        let mut hess = vec![vec![0.0; n]; n_outputs];

        let mut trees: Vec<Vec<Tree>> = Vec::with_capacity(params.n_rounds);
        let mut best_loss = f64::INFINITY;
        let mut best_rounds = 0;

        for round in 0..params.n_rounds {
            let rows = sample_rows(&fit_rows, params.subsample, &mut rng);
            let features = sample_features(x.n_features(), params.colsample, &mut rng);

            objective.gradients(y, &raw, &rows, &mut grad, &mut hess);

            let mut round_trees = Vec::with_capacity(n_outputs);
            for k in 0..n_outputs {
                let ctx = SplitContext {
                    binned: &binned,
                    mapper: &mapper,
                    grad: &grad[k],
                    hess: &hess[k],
                    features: &features,
                    params: gain_params,
                };
                let tree = grow(params.growth, &ctx, &rows, params.learning_rate);
                for (i, r) in raw[k].iter_mut().enumerate() {
                    *r += tree.predict_row(x, i);
                }
                round_trees.push(tree);
            }
            trees.push(round_trees);

            if let (Some(patience), false) = (params.early_stopping_rounds, valid_rows.is_empty()) {
                let loss = objective.loss(y, &raw, &valid_rows);
                if loss < best_loss - 1e-12 {
                    best_loss = loss;
                    best_rounds = round + 1;
                } else if round + 1 - best_rounds >= patience {
                    debug!(round, best_rounds, best_loss, "early stopping");
                    break;
                }
            }
        }

        if params.early_stopping_rounds.is_some() && !valid_rows.is_empty() {
            trees.truncate(best_rounds.max(1));
        }

        Ok(Self {
            objective,
            base_score,
            trees,
            n_features: x.n_features(),
        })
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    /// Raw scores per output for every row.
    pub fn raw_scores(&self, x: &FeatureMatrix) -> LoResult<Vec<Vec<f64>>> {
        if x.n_features() != self.n_features {
            return Err(validation_error!(
                "model expects {} features, got {}",
                self.n_features,
                x.n_features()
            ));
        }

        let mut raw: Vec<Vec<f64>> = self
            .base_score
            .iter()
            .map(|&b| vec![b; x.n_rows()])
            .collect();
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                for (i, r) in raw[k].iter_mut().enumerate() {
                    *r += tree.predict_row(x, i);
                }
            }
        }
        Ok(raw)
    }

    /// Predicted values (regression) or class indices (classification).
    pub fn predict(&self, x: &FeatureMatrix) -> LoResult<Vec<f64>> {
        let raw = self.raw_scores(x)?;
        let mut row_scores = vec![0.0; raw.len()];
        Ok((0..x.n_rows())
            .map(|i| {
                for (k, s) in row_scores.iter_mut().enumerate() {
                    *s = raw[k][i];
                }
                self.objective.predict(&row_scores)
            })
            .collect())
    }

    /// Importance of every feature in `names`, including unused ones at 0.
    pub fn importances(&self, names: &[String], kind: ImportanceKind) -> BTreeMap<String, f64> {
        let mut gain = vec![0.0; self.n_features];
        let mut splits = vec![0.0; self.n_features];
        for tree in self.trees.iter().flatten() {
            tree.for_each_split(|feature, g| {
                if let (Some(total_gain), Some(count)) = (gain.get_mut(feature), splits.get_mut(feature)) {
                    *total_gain += g;
                    *count += 1.0;
                }
            });
        }

        let values = match kind {
            ImportanceKind::SplitCount => splits,
            ImportanceKind::Gain => normalise(gain, 1.0),
            ImportanceKind::GainPercent => normalise(gain, 100.0),
        };
        names.iter().cloned().zip(values).collect()
    }
}

fn normalise(values: Vec<f64>, scale: f64) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return values.iter().map(|_| 0.0).collect();
    }
    values.into_iter().map(|v| scale * v / total).collect()
}

/// Split rows into fit and early-stopping holdout rows, both sorted.
fn holdout_rows(n: usize, params: &BoostingParams, rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
    let all: Vec<usize> = (0..n).collect();
    if params.early_stopping_rounds.is_none() || n < EARLY_STOPPING_MIN_ROWS {
        return (all, Vec::new());
    }

    let n_valid = ((n as f64 * EARLY_STOPPING_FRACTION).ceil() as usize).max(2);
    let mut shuffled = all;
    shuffled.shuffle(rng);
    let mut fit = shuffled.split_off(n_valid);
    let mut valid = shuffled;
    fit.sort_unstable();
    valid.sort_unstable();
    (fit, valid)
}

fn sample_rows(rows: &[usize], rate: f64, rng: &mut ChaCha8Rng) -> Vec<usize> {
    if rate >= 1.0 {
        return rows.to_vec();
    }
    let sampled: Vec<usize> = rows
        .iter()
        .copied()
        .filter(|_| rng.random::<f64>() < rate)
        .collect();
    if sampled.len() < 2 {
        rows.to_vec()
    } else {
        sampled
    }
}

fn sample_features(n_features: usize, rate: f64, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut features: Vec<usize> = (0..n_features).collect();
    if rate >= 1.0 || n_features == 0 {
        return features;
    }
    let keep = ((n_features as f64 * rate).ceil() as usize).clamp(1, n_features);
    features.shuffle(rng);
    features.truncate(keep);
    features.sort_unstable();
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use lo_types::LoError;

    fn linear_data(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let x0: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        let x1: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
        let y: Vec<f64> = x0.iter().map(|v| 3.0 * v + 1.0).collect();
        let x = FeatureMatrix::new(vec!["signal".into(), "noise".into()], vec![x0, x1], n).unwrap();
        (x, y)
    }

    fn mse(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64
    }

    #[test]
    fn regression_fit_reduces_error() {
        let (x, y) = linear_data(200);
        let params = BoostingParams {
            n_rounds: 50,
            learning_rate: 0.3,
            growth: GrowthStrategy::DepthWise { max_depth: 3 },
            ..BoostingParams::default()
        };
        let model = BoostedModel::fit(&x, &y, Objective::SquaredError, &params).unwrap();
        let pred = model.predict(&x).unwrap();

        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let baseline = mse(&y, &vec![mean; y.len()]);
        assert!(mse(&y, &pred) < baseline * 0.05);

        let importance = model.importances(x.names(), ImportanceKind::Gain);
        assert!(importance["signal"] > importance["noise"]);
        assert!((importance.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn classification_with_every_growth_strategy() {
        let n = 120;
        let x0: Vec<f64> = (0..n).map(|i| (i % 10) as f64).collect();
        let y: Vec<f64> = x0.iter().map(|v| if *v >= 5.0 { 1.0 } else { 0.0 }).collect();
        let x = FeatureMatrix::new(vec!["x0".into()], vec![x0], n).unwrap();

        for growth in [
            GrowthStrategy::DepthWise { max_depth: 2 },
            GrowthStrategy::LeafWise {
                num_leaves: 4,
                max_depth: None,
            },
            GrowthStrategy::Oblivious { depth: 2 },
        ] {
            let params = BoostingParams {
                n_rounds: 20,
                learning_rate: 0.5,
                growth,
                ..BoostingParams::default()
            };
            let model = BoostedModel::fit(&x, &y, Objective::Logistic, &params).unwrap();
            assert_eq!(model.predict(&x).unwrap(), y, "growth {growth:?}");
        }
    }

    #[test]
    fn multiclass_softmax() {
        let n = 90;
        let x0: Vec<f64> = (0..n).map(|i| (i % 9) as f64).collect();
        let y: Vec<f64> = x0.iter().map(|v| (v / 3.0).floor()).collect();
        let x = FeatureMatrix::new(vec!["x0".into()], vec![x0], n).unwrap();

        let params = BoostingParams {
            n_rounds: 30,
            learning_rate: 0.5,
            ..BoostingParams::default()
        };
        let model = BoostedModel::fit(&x, &y, Objective::Softmax { n_classes: 3 }, &params).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);

        let counts = model.importances(x.names(), ImportanceKind::SplitCount);
        assert!(counts["x0"] >= 1.0);
    }

    #[test]
    fn seeded_fit_is_deterministic() {
        let (x, y) = linear_data(150);
        let params = BoostingParams {
            n_rounds: 30,
            subsample: 0.8,
            colsample: 0.5,
            early_stopping_rounds: Some(EARLY_STOPPING_PATIENCE),
            seed: 17,
            ..BoostingParams::default()
        };
        let a = BoostedModel::fit(&x, &y, Objective::SquaredError, &params).unwrap();
        let b = BoostedModel::fit(&x, &y, Objective::SquaredError, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn early_stopping_truncates() {
        // pure noise target: holdout loss stops improving quickly
        let n = 100;
        let x0: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| ((i * 37) % 17) as f64).collect();
        let x = FeatureMatrix::new(vec!["x0".into()], vec![x0], n).unwrap();

        let params = BoostingParams {
            n_rounds: 500,
            learning_rate: 0.3,
            early_stopping_rounds: Some(EARLY_STOPPING_PATIENCE),
            ..BoostingParams::default()
        };
        let model = BoostedModel::fit(&x, &y, Objective::SquaredError, &params).unwrap();
        assert!(model.n_rounds() < 500);
        assert!(model.n_rounds() >= 1);
    }

    #[test]
    fn persisted_model_predicts_identically() {
        let (x, y) = linear_data(60);
        let model = BoostedModel::fit(&x, &y, Objective::SquaredError, &BoostingParams::default()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: BoostedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model.predict(&x).unwrap(), back.predict(&x).unwrap());
    }

    #[test]
    fn invalid_inputs() {
        let (x, y) = linear_data(10);
        let bad = BoostingParams {
            subsample: 0.0,
            ..BoostingParams::default()
        };
        assert!(BoostedModel::fit(&x, &y, Objective::SquaredError, &bad).is_err());
        assert!(BoostedModel::fit(&x, &y[..5], Objective::SquaredError, &BoostingParams::default()).is_err());

        let blank = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![vec![f64::NAN; 10]; 2], 10).unwrap();
        assert!(matches!(
            BoostedModel::fit(&blank, &y, Objective::SquaredError, &BoostingParams::default()),
            Err(LoError::Validation(_))
        ));
    }
}
