//! Tabular datasets, class labels and prediction values.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use crate::errors::{DataError, LoResult};

/// Values of a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Floating point values; missing cells are NaN.
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "numeric",
            Self::Text(_) => "text",
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Numeric(values) => Self::Numeric(rows.iter().map(|&i| values[i]).collect()),
            Self::Text(values) => Self::Text(rows.iter().map(|&i| values[i].clone()).collect()),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A table of equally long, uniquely named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> LoResult<Self> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();

        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DataError::DuplicateColumn {
                    column: column.name.clone(),
                }
                .into());
            }
            if column.len() != n_rows {
                return Err(DataError::RaggedColumn {
                    column: column.name.clone(),
                    expected: n_rows,
                    actual: column.len(),
                }
                .into());
            }
        }

        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Every column except `name`, in original order.
    pub fn without_column(&self, name: &str) -> Dataset {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| c.name != name)
            .cloned()
            .collect();
        let n_rows = if columns.is_empty() { 0 } else { self.n_rows };
        Dataset { columns, n_rows }
    }

    /// A new dataset holding only `rows`, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(rows),
                })
                .collect(),
            n_rows: rows.len(),
        }
    }
}

/// A class label as it appeared in the target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Number(f64),
    Text(String),
}

impl Label {
    /// Total order used to assign stable class indices: numbers before text.
    pub fn total_cmp(&self, other: &Label) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Output of a prediction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predictions {
    /// Regression outputs.
    Values(Vec<f64>),
    /// Predicted classes.
    Labels(Vec<Label>),
}

impl Predictions {
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LoError;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::numeric("age", vec![32.0, 45.0, 28.0, 38.0]),
            Column::text(
                "city",
                vec!["a".into(), "b".into(), "a".into(), "c".into()],
            ),
            Column::numeric("churn", vec![0.0, 0.0, 1.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn dataset_shape() {
        let ds = sample();
        assert_eq!(ds.n_rows(), 4);
        assert_eq!(ds.n_columns(), 3);
        assert_eq!(ds.column_names(), vec!["age", "city", "churn"]);
        assert!(ds.has_column("churn"));
        assert!(!ds.has_column("income"));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Dataset::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("b", vec![1.0]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            LoError::Data(DataError::RaggedColumn { actual: 1, .. })
        ));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = Dataset::new(vec![
            Column::numeric("a", vec![1.0]),
            Column::numeric("a", vec![2.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, LoError::Data(DataError::DuplicateColumn { .. })));
    }

    #[test]
    fn without_column_drops_target() {
        let features = sample().without_column("churn");
        assert_eq!(features.column_names(), vec!["age", "city"]);
        assert_eq!(features.n_rows(), 4);
    }

    #[test]
    fn take_rows_preserves_order() {
        let subset = sample().take_rows(&[3, 0]);
        assert_eq!(subset.n_rows(), 2);
        match &subset.column("age").unwrap().data {
            ColumnData::Numeric(v) => assert_eq!(v, &vec![38.0, 32.0]),
            other => panic!("unexpected column data: {other:?}"),
        }
        match &subset.column("city").unwrap().data {
            ColumnData::Text(v) => assert_eq!(v, &vec!["c".to_string(), "a".to_string()]),
            other => panic!("unexpected column data: {other:?}"),
        }
    }

    #[test]
    fn label_ordering_puts_numbers_first() {
        let mut labels = vec![
            Label::Text("yes".into()),
            Label::Number(1.0),
            Label::Text("no".into()),
            Label::Number(0.0),
        ];
        labels.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            labels,
            vec![
                Label::Number(0.0),
                Label::Number(1.0),
                Label::Text("no".into()),
                Label::Text("yes".into()),
            ]
        );
    }

    #[test]
    fn predictions_serialize_untagged() {
        let preds = Predictions::Labels(vec![Label::Number(1.0), Label::Text("x".into())]);
        assert_eq!(serde_json::to_string(&preds).unwrap(), r#"[1.0,"x"]"#);
        assert_eq!(preds.len(), 2);
    }
}
