//! The synchronous training pipeline run for each training call.

use lo_data::train_test_split;
use lo_types::{BackendConfig, DataError, Dataset, LoError, LoResult, ModelResult, TrainingConfig};
use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::backends::{backend_for, TrainingTask};
use crate::encoding::{FeatureEncoder, TargetEncoder};
use crate::metrics::evaluate;

/// Encode, split, fit and evaluate.
///
/// The returned result has an empty `model_path`; the caller fills it in once
/// the artifact has been persisted.
pub fn run_pipeline(dataset: &Dataset, target: &str, config: &TrainingConfig) -> LoResult<(Artifact, ModelResult)> {
    let target_column = dataset.column(target).ok_or_else(|| LoError::ColumnNotFound {
        column: target.to_string(),
    })?;
    config.validate()?;
    let metric = config.metric()?;

    let features = dataset.without_column(target);
    if features.n_columns() == 0 {
        return Err(DataError::InvalidDataset {
            message: format!("dataset has no feature columns besides target {target}"),
        }
        .into());
    }

    let split = train_test_split(dataset.n_rows(), config.test_fraction, config.random_seed)?;
    debug!(
        train_rows = split.train.len(),
        test_rows = split.test.len(),
        seed = config.random_seed,
        "dataset partitioned"
    );

    // encoders only see training rows; test-only categories and classes stay unknown
    let train_rows = dataset.take_rows(&split.train);
    let train_target = train_rows.column(target).ok_or_else(|| LoError::ColumnNotFound {
        column: target.to_string(),
    })?;

    let backend = backend_for(config.backend);
    let feature_encoder = FeatureEncoder::fit(
        &train_rows.without_column(target),
        backend.kind().name(),
        backend.accepts_categorical(),
    )?;
    let target_encoder = TargetEncoder::fit(config.problem_type, train_target)?;

    let x = feature_encoder.transform(&features)?;
    let y = target_encoder.encode_with_unseen(target_column)?;

    let train_x = x.take_rows(&split.train);
    let test_x = x.take_rows(&split.test);
    let train_y: Vec<f64> = split.train.iter().map(|&i| y[i]).collect();
    let test_y: Vec<f64> = split.test.iter().map(|&i| y[i]).collect();

    info!(
        backend = %config.backend,
        problem_type = %config.problem_type,
        rows = dataset.n_rows(),
        features = x.n_features(),
        "fitting backend"
    );

    let task = TrainingTask {
        problem_type: config.problem_type,
        n_classes: target_encoder.n_classes(),
        train_x: &train_x,
        train_y: &train_y,
        test_x: &test_x,
        test_y: &test_y,
        config,
        metric,
    };
    let fitted = backend.fit(&task)?;

    let predictions = backend.predict(&fitted.learner, &test_x)?;
    let evaluation = evaluate(config.problem_type, &test_y, &predictions)?;
    let feature_importance = backend.importances(&fitted.learner, x.names());

    let result = ModelResult {
        score: evaluation.objective,
        metrics: evaluation.metrics,
        feature_importance,
        config: BackendConfig {
            backend: config.backend.name().to_string(),
            params: fitted.params,
        },
        model_path: String::new(),
    };

    let artifact = Artifact {
        backend: config.backend,
        problem_type: config.problem_type,
        feature_encoder,
        target_encoder,
        learner: fitted.learner,
    };

    Ok((artifact, result))
}
