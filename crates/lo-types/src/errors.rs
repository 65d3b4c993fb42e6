use thiserror::Error;

/// Main error type for the LuminaOps AutoML core
#[derive(Error, Debug)]
pub enum LoError {
    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("Unsupported problem type: {problem_type}")]
    UnsupportedProblemType { problem_type: String },

    #[error("Unsupported feature type: backend {backend} cannot encode {kind} column '{column}'")]
    UnsupportedFeatureType {
        backend: String,
        column: String,
        kind: String,
    },

    #[error("No viable trial: all {attempted} trials failed{}", last_error_suffix(.last_error))]
    NoViableTrial {
        attempted: usize,
        last_error: Option<String>,
    },

    #[error("Backend {backend} training failed: {source}")]
    BackendTrainingFailed {
        backend: String,
        #[source]
        source: Box<LoError>,
    },

    #[error("Evaluation error: {message}")]
    EvaluationError { message: String },

    #[error("Training failed for model {model_id}: {source}")]
    TrainingFailed {
        model_id: String,
        #[source]
        source: Box<LoError>,
    },

    #[error("Model not found: {model_id}")]
    ModelNotFound { model_id: String },

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(message) => format!(" (last error: {message})"),
        None => String::new(),
    }
}

impl LoError {
    /// Wrap a failure in the single kind surfaced for a whole training call.
    pub fn training_failed(model_id: impl Into<String>, cause: LoError) -> Self {
        Self::TrainingFailed {
            model_id: model_id.into(),
            source: Box::new(cause),
        }
    }

    pub fn backend_failed(backend: impl Into<String>, cause: LoError) -> Self {
        Self::BackendTrainingFailed {
            backend: backend.into(),
            source: Box::new(cause),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::EvaluationError {
            message: message.into(),
        }
    }

    /// Innermost error of a `TrainingFailed` / `BackendTrainingFailed` chain.
    pub fn root_cause(&self) -> &LoError {
        match self {
            Self::TrainingFailed { source, .. } | Self::BackendTrainingFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Dataset and data-source errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Invalid dataset: {message}")]
    InvalidDataset { message: String },

    #[error("Column {column} has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column name: {column}")]
    DuplicateColumn { column: String },

    #[error("Insufficient data: {rows} rows cannot fill train and test partitions of at least {min_per_partition} rows")]
    InsufficientRows {
        rows: usize,
        min_per_partition: usize,
    },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },
}

/// Result type alias for LuminaOps operations
pub type LoResult<T> = Result<T, LoError>;

/// Helper trait for converting string errors
pub trait IntoLoError {
    fn into_lo_error(self) -> LoError;
}

impl IntoLoError for String {
    fn into_lo_error(self) -> LoError {
        LoError::Internal(self)
    }
}

impl IntoLoError for &str {
    fn into_lo_error(self) -> LoError {
        LoError::Internal(self.to_string())
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::LoError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::LoError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::LoError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let error = LoError::UnsupportedFeatureType {
            backend: "gbt_a".to_string(),
            column: "city".to_string(),
            kind: "text".to_string(),
        };

        assert!(error.to_string().contains("gbt_a"));
        assert!(error.to_string().contains("city"));

        let no_trial = LoError::NoViableTrial {
            attempted: 3,
            last_error: Some("boom".to_string()),
        };
        assert_eq!(
            no_trial.to_string(),
            "No viable trial: all 3 trials failed (last error: boom)"
        );
    }

    #[test]
    fn test_error_conversion() {
        let data_error = DataError::InvalidDataset {
            message: "test".to_string(),
        };
        let lo_error: LoError = data_error.into();

        match lo_error {
            LoError::Data(_) => (),
            _ => panic!("Expected Data error"),
        }
    }

    #[test]
    fn test_training_failed_keeps_cause() {
        let cause = LoError::backend_failed(
            "gbt_b",
            LoError::NoViableTrial {
                attempted: 5,
                last_error: None,
            },
        );
        let error = LoError::training_failed("automl_0", cause);

        assert!(matches!(
            error.root_cause(),
            LoError::NoViableTrial { attempted: 5, .. }
        ));
        let source = error.source().expect("training failure has a source");
        assert!(source.to_string().contains("gbt_b"));
    }

    #[test]
    fn test_root_cause_of_plain_error_is_itself() {
        let error = LoError::ModelNotFound {
            model_id: "m".to_string(),
        };
        assert!(matches!(error.root_cause(), LoError::ModelNotFound { .. }));
    }

    #[test]
    fn test_macros() {
        let _validation_err = validation_error!("Invalid value: {}", 42);
        let _internal_err = internal_error!("Something went wrong");
        let _config_err = config_error!("Missing required field: {}", "target");
    }
}
