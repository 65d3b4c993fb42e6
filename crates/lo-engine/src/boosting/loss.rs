//! Boosting objectives: gradients, hessians and output transforms.

use serde::{Deserialize, Serialize};

const MIN_HESSIAN: f64 = 1e-6;
const PROB_EPS: f64 = 1e-12;

/// Loss being minimised by the booster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Objective {
    SquaredError,
    /// Binary log-loss over a single raw score.
    Logistic,
    /// Multiclass cross-entropy over one raw score per class.
    Softmax { n_classes: usize },
}

impl Objective {
    /// Pick the objective for a task; `n_classes` is 0 for regression.
    pub fn for_task(n_classes: usize) -> Self {
        match n_classes {
            0 | 1 => Self::SquaredError,
            2 => Self::Logistic,
            n => Self::Softmax { n_classes: n },
        }
    }

    /// Number of raw scores (and trees per round).
    pub fn n_outputs(&self) -> usize {
        match self {
            Self::SquaredError | Self::Logistic => 1,
            Self::Softmax { n_classes } => *n_classes,
        }
    }

    /// Initial raw score per output, from the targets of `rows`.
    pub fn base_score(&self, y: &[f64], rows: &[usize]) -> Vec<f64> {
        let n = rows.len().max(1) as f64;
        match self {
            Self::SquaredError => vec![rows.iter().map(|&i| y[i]).sum::<f64>() / n],
            Self::Logistic => {
                let p = (rows.iter().map(|&i| y[i]).sum::<f64>() / n).clamp(1e-6, 1.0 - 1e-6);
                vec![(p / (1.0 - p)).ln()]
            }
            Self::Softmax { n_classes } => {
                let mut counts = vec![1.0; *n_classes];
                for &i in rows {
                    if let Some(c) = counts.get_mut(y[i] as usize) {
                        *c += 1.0;
                    }
                }
                let total: f64 = counts.iter().sum();
                counts.iter().map(|c| (c / total).ln()).collect()
            }
        }
    }

    /// Fill `grad[k][i]` / `hess[k][i]` for every row in `rows`.
    pub fn gradients(
        &self,
        y: &[f64],
        raw: &[Vec<f64>],
        rows: &[usize],
        grad: &mut [Vec<f64>],
        hess: &mut [Vec<f64>],
    ) {
        match self {
            Self::SquaredError => {
                for &i in rows {
                    grad[0][i] = raw[0][i] - y[i];
                    hess[0][i] = 1.0;
                }
            }
            Self::Logistic => {
                for &i in rows {
                    let p = sigmoid(raw[0][i]);
                    grad[0][i] = p - y[i];
                    hess[0][i] = (p * (1.0 - p)).max(MIN_HESSIAN);
                }
            }
            Self::Softmax { n_classes } => {
                let mut scores = vec![0.0; *n_classes];
                for &i in rows {
                    for (k, s) in scores.iter_mut().enumerate() {
                        *s = raw[k][i];
                    }
                    softmax_in_place(&mut scores);
                    for (k, &p) in scores.iter().enumerate() {
                        let target = if y[i] as usize == k { 1.0 } else { 0.0 };
                        grad[k][i] = p - target;
                        hess[k][i] = (p * (1.0 - p)).max(MIN_HESSIAN);
                    }
                }
            }
        }
    }

    /// Mean loss over `rows`.
    pub fn loss(&self, y: &[f64], raw: &[Vec<f64>], rows: &[usize]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let total: f64 = match self {
            Self::SquaredError => rows.iter().map(|&i| (raw[0][i] - y[i]).powi(2)).sum(),
            Self::Logistic => rows
                .iter()
                .map(|&i| {
                    let p = sigmoid(raw[0][i]).clamp(PROB_EPS, 1.0 - PROB_EPS);
                    -(y[i] * p.ln() + (1.0 - y[i]) * (1.0 - p).ln())
                })
                .sum(),
            Self::Softmax { n_classes } => {
                let mut scores = vec![0.0; *n_classes];
                rows.iter()
                    .map(|&i| {
                        for (k, s) in scores.iter_mut().enumerate() {
                            *s = raw[k][i];
                        }
                        softmax_in_place(&mut scores);
                        let p = scores.get(y[i] as usize).copied().unwrap_or(0.0);
                        -p.max(PROB_EPS).ln()
                    })
                    .sum()
            }
        };
        total / rows.len() as f64
    }

    /// Turn one row's raw scores into a prediction: a value or a class index.
    pub fn predict(&self, raw: &[f64]) -> f64 {
        match self {
            Self::SquaredError => raw[0],
            Self::Logistic => {
                if sigmoid(raw[0]) >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            // Earliest class wins ties.
            Self::Softmax { .. } => {
                raw.iter()
                    .enumerate()
                    .fold((0usize, f64::NEG_INFINITY), |best, (k, &s)| {
                        if s > best.1 {
                            (k, s)
                        } else {
                            best
                        }
                    })
                    .0 as f64
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax_in_place(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objective_for_task() {
        assert_eq!(Objective::for_task(0), Objective::SquaredError);
        assert_eq!(Objective::for_task(2), Objective::Logistic);
        assert_eq!(Objective::for_task(4), Objective::Softmax { n_classes: 4 });
        assert_eq!(Objective::for_task(4).n_outputs(), 4);
    }

    #[test]
    fn squared_error_gradients() {
        let y = [1.0, 3.0];
        let raw = vec![vec![2.0, 2.0]];
        let mut grad = vec![vec![0.0; 2]];
        let mut hess = vec![vec![0.0; 2]];
        Objective::SquaredError.gradients(&y, &raw, &[0, 1], &mut grad, &mut hess);

        assert_eq!(grad[0], vec![1.0, -1.0]);
        assert_eq!(hess[0], vec![1.0, 1.0]);
        assert_eq!(Objective::SquaredError.base_score(&y, &[0, 1]), vec![2.0]);
    }

    #[test]
    fn logistic_base_score_matches_prior() {
        let y = [1.0, 0.0, 0.0, 0.0];
        let base = Objective::Logistic.base_score(&y, &[0, 1, 2, 3]);
        assert!((sigmoid(base[0]) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn softmax_gradients_sum_to_zero() {
        let objective = Objective::Softmax { n_classes: 3 };
        let y = [2.0];
        let raw = vec![vec![0.1], vec![0.5], vec![-0.3]];
        let mut grad = vec![vec![0.0]; 3];
        let mut hess = vec![vec![0.0]; 3];
        objective.gradients(&y, &raw, &[0], &mut grad, &mut hess);

        let total: f64 = grad.iter().map(|g| g[0]).sum();
        assert!(total.abs() < 1e-12);
        assert!(grad[2][0] < 0.0);
        assert_eq!(objective.predict(&[0.1, 0.5, -0.3]), 1.0);
        assert_eq!(objective.predict(&[0.5, 0.5, 0.1]), 0.0);
    }
}
