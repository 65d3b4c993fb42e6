//! Public entry point: training, prediction and model management.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use lo_data::{validate_model_id, ArtifactStore};
use lo_types::{internal_error, Dataset, LoError, LoResult, ModelResult, Predictions, TrainingConfig};
use tracing::{error, info};

use crate::artifact::PersistedModel;
use crate::config::ServiceConfig;
use crate::pipeline::run_pipeline;
use crate::registry::ModelRegistry;
use crate::worker::{InFlight, WorkerPool};

/// Coordinates training calls against a shared registry and artifact store.
///
/// Cheap to clone; clones share the registry, store and worker pool.
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    registry: Arc<ModelRegistry>,
    store: Arc<ArtifactStore>,
    pool: WorkerPool,
    inflight: InFlight,
}

impl TrainingOrchestrator {
    pub fn new(config: &ServiceConfig) -> LoResult<Self> {
        Self::with_registry(config, Arc::new(ModelRegistry::new()))
    }

    /// Build around an existing registry, e.g. one shared with another service.
    pub fn with_registry(config: &ServiceConfig, registry: Arc<ModelRegistry>) -> LoResult<Self> {
        let store = ArtifactStore::new(&config.model_dir)?;
        info!(
            model_dir = %config.model_dir.display(),
            max_workers = config.max_workers,
            "training orchestrator ready"
        );

        Ok(Self {
            registry,
            store: Arc::new(store),
            pool: WorkerPool::new(config.max_workers),
            inflight: InFlight::new(),
        })
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Train, persist and register a model.
    ///
    /// Without `model_id` the next free `automl_<n>` id is used. Every failure
    /// is reported as [`LoError::TrainingFailed`] wrapping the cause, and
    /// nothing is registered unless the artifact was persisted.
    pub async fn train(
        &self,
        dataset: Dataset,
        target: &str,
        config: TrainingConfig,
        model_id: Option<String>,
    ) -> LoResult<ModelResult> {
        let model_id = match model_id {
            Some(id) => id,
            None => self.allocate_model_id(),
        };

        self.train_as(&model_id, dataset, target, config)
            .await
            .map_err(|cause| {
                error!(model_id = %model_id, error = %cause, "training failed");
                LoError::training_failed(&model_id, cause)
            })
    }

    async fn train_as(
        &self,
        model_id: &str,
        dataset: Dataset,
        target: &str,
        config: TrainingConfig,
    ) -> LoResult<ModelResult> {
        let Some(_inflight) = self.inflight.enter() else {
            return Err(internal_error!("orchestrator is shutting down"));
        };

        validate_model_id(model_id)?;
        if !dataset.has_column(target) {
            return Err(LoError::ColumnNotFound {
                column: target.to_string(),
            });
        }
        config.validate()?;

        info!(
            model_id,
            backend = %config.backend,
            problem_type = %config.problem_type,
            rows = dataset.n_rows(),
            trials = config.trial_count,
            time_budget_secs = config.time_budget_secs,
            "training started"
        );
        let started = Instant::now();

        let target_name = target.to_string();
        let (artifact, mut result) = self
            .pool
            .run(move || run_pipeline(&dataset, &target_name, &config))
            .await?;

        let _guard = self.registry.lock_model(model_id).await;
        let path = self.store.path_for(model_id)?;
        result.model_path = path.display().to_string();

        let persisted = PersistedModel::new(model_id, artifact, result);
        self.store.save(model_id, &persisted).await?;

        let PersistedModel { artifact, result, .. } = persisted;
        self.registry.insert(model_id, Arc::new(artifact), result.clone());

        info!(
            model_id,
            score = result.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            path = %result.model_path,
            "training finished"
        );
        Ok(result)
    }

    fn allocate_model_id(&self) -> String {
        self.registry.next_model_id_with(|id| {
            self.store
                .path_for(id)
                .map(|path| path.exists())
                .unwrap_or(false)
        })
    }

    /// Predict with a registered model on the worker pool.
    pub async fn predict(&self, model_id: &str, features: Dataset) -> LoResult<Predictions> {
        let registry = self.registry.clone();
        let model_id = model_id.to_string();
        self.pool
            .run(move || registry.predict(&model_id, &features))
            .await
    }

    pub fn get_model_info(&self, model_id: &str) -> LoResult<ModelResult> {
        self.registry.get_info(model_id)
    }

    pub async fn load_model<P: AsRef<Path>>(&self, path: P, model_id: &str) -> LoResult<()> {
        self.registry.load(path, model_id).await
    }

    pub fn list_models(&self) -> Vec<(String, ModelResult)> {
        self.registry.list()
    }

    /// Stop accepting training calls and wait for the running ones to finish.
    pub async fn shutdown(&self) {
        self.inflight.close();
        let pending = self.inflight.count();
        if pending > 0 {
            info!(pending, "waiting for in-flight training calls");
        }
        self.inflight.wait_idle().await;
        info!("training orchestrator stopped");
    }
}
