//! Ridge regression, used directly for regression and one-vs-rest for classes.

use lo_types::{internal_error, validation_error, LoResult};
use serde::{Deserialize, Serialize};

use crate::encoding::FeatureMatrix;

const PIVOT_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearOutput {
    intercept: f64,
    weights: Vec<f64>,
}

impl LinearOutput {
    fn predict(&self, row: &[f64]) -> f64 {
        self.intercept + self.weights.iter().zip(row).map(|(w, v)| w * v).sum::<f64>()
    }
}

/// L2-regularised least squares on standardised features.
///
/// Missing values are imputed with the training mean before scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    alpha: f64,
    n_classes: usize,
    means: Vec<f64>,
    scales: Vec<f64>,
    outputs: Vec<LinearOutput>,
}

impl RidgeModel {
    /// `n_classes` is 0 for regression; `y` holds class indices otherwise.
    pub fn fit(x: &FeatureMatrix, y: &[f64], n_classes: usize, alpha: f64) -> LoResult<Self> {
        if !(alpha >= 0.0 && alpha.is_finite()) {
            return Err(validation_error!("alpha must be non-negative, got {alpha}"));
        }
        if x.n_rows() == 0 || y.len() != x.n_rows() {
            return Err(validation_error!(
                "cannot fit ridge on {} rows and {} targets",
                x.n_rows(),
                y.len()
            ));
        }

        let (means, scales) = column_moments(x);
        let z = standardise(x, &means, &scales);

        let targets: Vec<Vec<f64>> = match n_classes {
            0..=2 => vec![y.to_vec()],
            n => (0..n)
                .map(|k| y.iter().map(|&v| if v as usize == k { 1.0 } else { 0.0 }).collect())
                .collect(),
        };

        let gram = gram_matrix(&z, alpha);
        let outputs = targets
            .iter()
            .map(|t| solve_output(&z, &gram, t))
            .collect::<LoResult<Vec<_>>>()?;

        Ok(Self {
            alpha,
            n_classes,
            means,
            scales,
            outputs,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Values for regression, class indices for classification.
    pub fn predict(&self, x: &FeatureMatrix) -> LoResult<Vec<f64>> {
        if x.n_features() != self.means.len() {
            return Err(validation_error!(
                "model expects {} features, got {}",
                self.means.len(),
                x.n_features()
            ));
        }

        let z = standardise(x, &self.means, &self.scales);
        let mut row = vec![0.0; z.len()];
        Ok((0..x.n_rows())
            .map(|i| {
                for (f, v) in row.iter_mut().enumerate() {
                    *v = z[f][i];
                }
                match self.n_classes {
                    0 | 1 => self.outputs[0].predict(&row),
                    2 => {
                        if self.outputs[0].predict(&row) >= 0.5 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    _ => argmax(self.outputs.iter().map(|o| o.predict(&row))) as f64,
                }
            })
            .collect())
    }
}

fn argmax(values: impl Iterator<Item = f64>) -> usize {
    values
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

fn column_moments(x: &FeatureMatrix) -> (Vec<f64>, Vec<f64>) {
    (0..x.n_features())
        .map(|f| {
            let finite: Vec<f64> = x.column(f).iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                return (0.0, 1.0);
            }
            let n = finite.len() as f64;
            let mean = finite.iter().sum::<f64>() / n;
            let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            (mean, if std > PIVOT_EPS { std } else { 1.0 })
        })
        .unzip()
}

fn standardise(x: &FeatureMatrix, means: &[f64], scales: &[f64]) -> Vec<Vec<f64>> {
    (0..x.n_features())
        .map(|f| {
            x.column(f)
                .iter()
                .map(|&v| if v.is_finite() { (v - means[f]) / scales[f] } else { 0.0 })
                .collect()
        })
        .collect()
}

/// `ZᵀZ + alpha·I` over centred columns.
fn gram_matrix(z: &[Vec<f64>], alpha: f64) -> Vec<Vec<f64>> {
    let p = z.len();
    let mut gram = vec![vec![0.0; p]; p];
    for a in 0..p {
        for b in a..p {
            let dot: f64 = z[a].iter().zip(&z[b]).map(|(u, v)| u * v).sum();
            gram[a][b] = dot;
            gram[b][a] = dot;
        }
        gram[a][a] += alpha;
    }
    gram
}

fn solve_output(z: &[Vec<f64>], gram: &[Vec<f64>], y: &[f64]) -> LoResult<LinearOutput> {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let rhs: Vec<f64> = z
        .iter()
        .map(|col| col.iter().zip(y).map(|(v, t)| v * (t - mean)).sum())
        .collect();
    let weights = solve(gram.to_vec(), rhs)?;
    Ok(LinearOutput {
        intercept: mean,
        weights,
    })
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> LoResult<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPS {
            return Err(internal_error!("singular system at column {col}"));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * w[k]).sum();
        w[row] = (b[row] - tail) / a[row][row];
    }
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_a_linear_relation() {
        let n = 50;
        let x0: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let x1: Vec<f64> = (0..n).map(|i| ((i * 3) % 7) as f64).collect();
        let y: Vec<f64> = x0.iter().zip(&x1).map(|(a, b)| 2.0 * a - b + 5.0).collect();
        let x = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![x0, x1], n).unwrap();

        let model = RidgeModel::fit(&x, &y, 0, 1e-6).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(&y) {
            assert!((p - t).abs() < 1e-3, "{p} vs {t}");
        }
    }

    #[test]
    fn classifies_binary_and_multiclass() {
        let n = 60;
        let x0: Vec<f64> = (0..n).map(|i| (i % 6) as f64).collect();
        let x = FeatureMatrix::new(vec!["x".into()], vec![x0.clone()], n).unwrap();

        let binary: Vec<f64> = x0.iter().map(|v| if *v >= 3.0 { 1.0 } else { 0.0 }).collect();
        let model = RidgeModel::fit(&x, &binary, 2, 0.1).unwrap();
        assert_eq!(model.predict(&x).unwrap(), binary);

        // one-hot features make one-vs-rest exact
        let onehot: Vec<Vec<f64>> = (0..3)
            .map(|k| x0.iter().map(|v| if (*v as usize) % 3 == k { 1.0 } else { 0.0 }).collect())
            .collect();
        let classes: Vec<f64> = x0.iter().map(|v| ((*v as usize) % 3) as f64).collect();
        let x = FeatureMatrix::new(vec!["c0".into(), "c1".into(), "c2".into()], onehot, n).unwrap();
        let model = RidgeModel::fit(&x, &classes, 3, 0.1).unwrap();
        assert_eq!(model.predict(&x).unwrap(), classes);
    }

    #[test]
    fn missing_values_are_imputed() {
        let x = FeatureMatrix::new(
            vec!["a".into(), "empty".into()],
            vec![vec![1.0, f64::NAN, 3.0, 4.0], vec![f64::NAN; 4]],
            4,
        )
        .unwrap();
        let model = RidgeModel::fit(&x, &[1.0, 2.0, 3.0, 4.0], 0, 1.0).unwrap();
        assert!(model.predict(&x).unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn singular_system_without_penalty() {
        let x = FeatureMatrix::new(
            vec!["a".into(), "copy".into()],
            vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]],
            3,
        )
        .unwrap();
        assert!(RidgeModel::fit(&x, &[1.0, 2.0, 3.0], 0, 0.0).is_err());
        assert!(RidgeModel::fit(&x, &[1.0, 2.0, 3.0], 0, 1.0).is_ok());
    }
}
