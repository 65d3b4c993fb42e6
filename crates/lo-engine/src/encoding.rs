//! Conversion between datasets and the numeric matrices learners consume.

use std::collections::BTreeSet;

use lo_types::{
    validation_error, Column, ColumnData, Dataset, Label, LoError, LoResult, Predictions,
    ProblemType,
};
use serde::{Deserialize, Serialize};

/// Column-major numeric feature matrix. Missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>, n_rows: usize) -> LoResult<Self> {
        if names.len() != columns.len() {
            return Err(validation_error!(
                "{} feature names for {} columns",
                names.len(),
                columns.len()
            ));
        }
        if let Some((name, column)) = names.iter().zip(&columns).find(|(_, c)| c.len() != n_rows) {
            return Err(validation_error!(
                "feature {name} has {} rows, expected {n_rows}",
                column.len()
            ));
        }
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.columns[feature][row]
    }

    pub fn take_rows(&self, rows: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| rows.iter().map(|&i| c[i]).collect())
                .collect(),
            n_rows: rows.len(),
        }
    }
}

/// How one feature column becomes numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnEncoding {
    Numeric,
    /// Text categories mapped to their index in sorted order; unseen values become NaN.
    Ordinal { categories: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub name: String,
    pub encoding: ColumnEncoding,
}

/// Feature encoding fitted on the training frame and stored with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    columns: Vec<EncodedColumn>,
}

impl FeatureEncoder {
    /// Fit an encoder for every column of `features`.
    ///
    /// Text columns are rejected with `UnsupportedFeatureType` unless
    /// `accepts_categorical` is set.
    pub fn fit(features: &Dataset, backend: &str, accepts_categorical: bool) -> LoResult<Self> {
        let columns = features
            .columns()
            .iter()
            .map(|column| {
                let encoding = match &column.data {
                    ColumnData::Numeric(_) => ColumnEncoding::Numeric,
                    ColumnData::Text(values) => {
                        if !accepts_categorical {
                            return Err(LoError::UnsupportedFeatureType {
                                backend: backend.to_string(),
                                column: column.name.clone(),
                                kind: column.data.kind().to_string(),
                            });
                        }
                        let categories: BTreeSet<&str> = values.iter().map(String::as_str).collect();
                        ColumnEncoding::Ordinal {
                            categories: categories.into_iter().map(str::to_string).collect(),
                        }
                    }
                };
                Ok(EncodedColumn {
                    name: column.name.clone(),
                    encoding,
                })
            })
            .collect::<LoResult<Vec<_>>>()?;

        Ok(Self { columns })
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[EncodedColumn] {
        &self.columns
    }

    /// Encode the fitted columns of `features`; extra columns are ignored.
    pub fn transform(&self, features: &Dataset) -> LoResult<FeatureMatrix> {
        let columns = self
            .columns
            .iter()
            .map(|encoded| {
                let column = features
                    .column(&encoded.name)
                    .ok_or_else(|| LoError::ColumnNotFound {
                        column: encoded.name.clone(),
                    })?;
                Ok(encode_column(&encoded.encoding, &column.data))
            })
            .collect::<LoResult<Vec<_>>>()?;

        FeatureMatrix::new(self.feature_names(), columns, features.n_rows())
    }
}

fn encode_column(encoding: &ColumnEncoding, data: &ColumnData) -> Vec<f64> {
    match (encoding, data) {
        (ColumnEncoding::Numeric, ColumnData::Numeric(values)) => values.clone(),
        (ColumnEncoding::Numeric, ColumnData::Text(values)) => values
            .iter()
            .map(|v| v.trim().parse::<f64>().unwrap_or(f64::NAN))
            .collect(),
        (ColumnEncoding::Ordinal { categories }, ColumnData::Text(values)) => values
            .iter()
            .map(|v| ordinal(categories, v))
            .collect(),
        (ColumnEncoding::Ordinal { categories }, ColumnData::Numeric(values)) => values
            .iter()
            .map(|v| ordinal(categories, &v.to_string()))
            .collect(),
    }
}

fn ordinal(categories: &[String], value: &str) -> f64 {
    categories
        .binary_search_by(|c| c.as_str().cmp(value))
        .map(|i| i as f64)
        .unwrap_or(f64::NAN)
}

/// Target encoding: identity for regression, class index for classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetEncoder {
    Regression,
    Classification { classes: Vec<Label> },
}

impl TargetEncoder {
    pub fn fit(problem_type: ProblemType, target: &Column) -> LoResult<Self> {
        match problem_type {
            ProblemType::Regression => {
                regression_values(target)?;
                Ok(Self::Regression)
            }
            ProblemType::Classification => {
                let mut classes = labels(target)?;
                classes.sort_by(|a, b| a.total_cmp(b));
                classes.dedup_by(|a, b| a.total_cmp(b).is_eq());

                if classes.len() < 2 {
                    return Err(validation_error!(
                        "classification target {} needs at least two classes, found {}",
                        target.name,
                        classes.len()
                    ));
                }
                Ok(Self::Classification { classes })
            }
        }
    }

    /// Number of classes, or 0 for regression.
    pub fn n_classes(&self) -> usize {
        match self {
            Self::Regression => 0,
            Self::Classification { classes } => classes.len(),
        }
    }

    /// Learner targets; every class label must have been seen by `fit`.
    pub fn encode(&self, target: &Column) -> LoResult<Vec<f64>> {
        self.learner_targets(target, false)
    }

    /// Like [`encode`](Self::encode), but labels unseen by `fit` map to
    /// index `n_classes`, which no learner predicts.
    pub fn encode_with_unseen(&self, target: &Column) -> LoResult<Vec<f64>> {
        self.learner_targets(target, true)
    }

    fn learner_targets(&self, target: &Column, allow_unseen: bool) -> LoResult<Vec<f64>> {
        match self {
            Self::Regression => Ok(regression_values(target)?.to_vec()),
            Self::Classification { classes } => labels(target)?
                .iter()
                .map(|label| match classes.binary_search_by(|c| c.total_cmp(label)) {
                    Ok(i) => Ok(i as f64),
                    Err(_) if allow_unseen => Ok(classes.len() as f64),
                    Err(_) => Err(validation_error!("unknown class label {label}")),
                })
                .collect(),
        }
    }

    /// Map learner outputs back to target values.
    pub fn decode(&self, values: &[f64]) -> Predictions {
        match self {
            Self::Regression => Predictions::Values(values.to_vec()),
            Self::Classification { classes } => {
                let last = classes.len().saturating_sub(1);
                Predictions::Labels(
                    values
                        .iter()
                        .filter_map(|v| {
                            let idx = (v.round().max(0.0) as usize).min(last);
                            classes.get(idx).cloned()
                        })
                        .collect(),
                )
            }
        }
    }
}

fn regression_values(target: &Column) -> LoResult<&[f64]> {
    match &target.data {
        ColumnData::Numeric(values) if values.iter().all(|v| v.is_finite()) => Ok(values),
        ColumnData::Numeric(_) => Err(validation_error!(
            "regression target {} contains missing or infinite values",
            target.name
        )),
        ColumnData::Text(_) => Err(validation_error!(
            "regression target {} is not numeric",
            target.name
        )),
    }
}

fn labels(target: &Column) -> LoResult<Vec<Label>> {
    match &target.data {
        ColumnData::Numeric(values) => values
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    Err(validation_error!("target {} has missing labels", target.name))
                } else if v.is_infinite() {
                    Err(validation_error!("target {} has a non-finite label {v}", target.name))
                } else {
                    Ok(Label::Number(v))
                }
            })
            .collect(),
        ColumnData::Text(values) => Ok(values.iter().cloned().map(Label::Text).collect()),
    }
}
