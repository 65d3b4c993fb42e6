//! Held-out evaluation metrics.
//!
//! Classification inputs are encoded class indices; regression inputs are raw
//! target values.

use std::collections::BTreeMap;

use lo_types::{LoError, LoResult, Metric, ProblemType};

/// Objective value plus the full metrics bundle for one problem type.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Accuracy for classification, R² for regression.
    pub objective: f64,
    pub metrics: BTreeMap<String, f64>,
}

/// Score predictions against the held-out truth.
pub fn evaluate(problem_type: ProblemType, y_true: &[f64], y_pred: &[f64]) -> LoResult<Evaluation> {
    check_inputs(y_true, y_pred)?;

    let (objective, metrics) = match problem_type {
        ProblemType::Classification => {
            let accuracy = accuracy(y_true, y_pred);
            let f1 = weighted_f1(y_true, y_pred);
            (
                accuracy,
                BTreeMap::from([
                    (Metric::Accuracy.name().to_string(), accuracy),
                    (Metric::WeightedF1.name().to_string(), f1),
                ]),
            )
        }
        ProblemType::Regression => {
            let mse = mean_squared_error(y_true, y_pred);
            let r2 = r2_score(y_true, y_pred);
            (
                r2,
                BTreeMap::from([
                    (Metric::MeanSquaredError.name().to_string(), mse),
                    (Metric::R2.name().to_string(), r2),
                ]),
            )
        }
    };

    Ok(Evaluation { objective, metrics })
}

/// Raw value of a single metric.
pub fn metric_value(metric: Metric, y_true: &[f64], y_pred: &[f64]) -> LoResult<f64> {
    check_inputs(y_true, y_pred)?;

    Ok(match metric {
        Metric::Accuracy => accuracy(y_true, y_pred),
        Metric::WeightedF1 => weighted_f1(y_true, y_pred),
        Metric::R2 => r2_score(y_true, y_pred),
        Metric::MeanSquaredError => mean_squared_error(y_true, y_pred),
    })
}

fn check_inputs(y_true: &[f64], y_pred: &[f64]) -> LoResult<()> {
    if y_true.is_empty() {
        return Err(LoError::evaluation("cannot evaluate an empty partition"));
    }
    if y_true.len() != y_pred.len() {
        return Err(LoError::evaluation(format!(
            "length mismatch: {} targets, {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if let Some(i) = y_pred.iter().position(|v| v.is_nan()) {
        return Err(LoError::evaluation(format!("prediction {i} is NaN")));
    }
    if let Some(i) = y_true.iter().position(|v| v.is_nan()) {
        return Err(LoError::evaluation(format!("target {i} is NaN")));
    }
    Ok(())
}

fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

#[derive(Default)]
struct ClassCounts {
    support: usize,
    true_positive: usize,
    predicted: usize,
}

/// Per-class F1 averaged with weights equal to class support in `y_true`.
fn weighted_f1(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mut classes: BTreeMap<u64, ClassCounts> = BTreeMap::new();

    for (t, p) in y_true.iter().zip(y_pred) {
        classes.entry(t.to_bits()).or_default().support += 1;
        classes.entry(p.to_bits()).or_default().predicted += 1;
        if t == p {
            classes.entry(t.to_bits()).or_default().true_positive += 1;
        }
    }

    let weighted: f64 = classes
        .values()
        .filter(|c| c.support > 0)
        .map(|c| {
            let tp = c.true_positive as f64;
            let precision = if c.predicted == 0 { 0.0 } else { tp / c.predicted as f64 };
            let recall = tp / c.support as f64;
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            f1 * c.support as f64
        })
        .sum();

    weighted / y_true.len() as f64
}

fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
