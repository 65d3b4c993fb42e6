//! In-memory registry of trained and loaded models.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lo_data::{read_artifact, validate_model_id};
use lo_types::{Dataset, LoError, LoResult, ModelResult, Predictions};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::artifact::{Artifact, PersistedModel};

const DEFAULT_ID_PREFIX: &str = "automl_";

/// A registered model: artifact and training result.
#[derive(Debug)]
pub struct RegistryEntry {
    pub artifact: Arc<Artifact>,
    pub result: ModelResult,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub registrations: u64,
    pub loads: u64,
    pub predictions: u64,
    pub misses: u64,
}

/// Write access to one model id; the lock is released on drop and its
/// slot freed once no other writer is queued on it.
#[derive(Debug)]
pub struct ModelWriteGuard<'a> {
    registry: &'a ModelRegistry,
    model_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ModelWriteGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // the map holds the only reference once nobody waits on the lock
        self.registry
            .write_locks
            .remove_if(&self.model_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Concurrent map from model id to model.
///
/// Reads never block each other. Writers to one id are serialized through
/// [`ModelRegistry::lock_model`]; the last writer wins.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: DashMap<String, Arc<RegistryEntry>>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
    sequence: AtomicU64,
    stats: RwLock<RegistryStats>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next `automl_<n>` id that is not registered.
    pub fn next_model_id(&self) -> String {
        self.next_model_id_with(|_| false)
    }

    /// Next `automl_<n>` id that is neither registered nor `taken`.
    pub fn next_model_id_with(&self, mut taken: impl FnMut(&str) -> bool) -> String {
        loop {
            let n = self.sequence.fetch_add(1, Ordering::Relaxed);
            let id = format!("{DEFAULT_ID_PREFIX}{n}");
            if !self.entries.contains_key(&id) && !taken(&id) {
                return id;
            }
        }
    }

    /// Exclusive write access to `model_id` until the guard is dropped.
    pub async fn lock_model(&self, model_id: &str) -> ModelWriteGuard<'_> {
        let lock = self
            .write_locks
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        ModelWriteGuard {
            registry: self,
            model_id: model_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Ids with a write lock currently allocated.
    pub fn write_lock_count(&self) -> usize {
        self.write_locks.len()
    }

    /// Register `artifact` under `model_id`, replacing any previous entry.
    pub fn insert(&self, model_id: &str, artifact: Arc<Artifact>, result: ModelResult) -> Arc<RegistryEntry> {
        let entry = Arc::new(RegistryEntry {
            artifact,
            result,
            registered_at: Utc::now(),
        });
        let replaced = self.entries.insert(model_id.to_string(), entry.clone()).is_some();
        self.stats.write().registrations += 1;

        debug!(model_id, replaced, "model registered");
        entry
    }

    pub fn get(&self, model_id: &str) -> LoResult<Arc<RegistryEntry>> {
        match self.entries.get(model_id) {
            Some(entry) => Ok(entry.value().clone()),
            None => {
                self.stats.write().misses += 1;
                Err(LoError::ModelNotFound {
                    model_id: model_id.to_string(),
                })
            }
        }
    }

    pub fn predict(&self, model_id: &str, features: &Dataset) -> LoResult<Predictions> {
        let entry = self.get(model_id)?;
        let predictions = entry.artifact.predict(features)?;
        self.stats.write().predictions += 1;
        Ok(predictions)
    }

    pub fn get_info(&self, model_id: &str) -> LoResult<ModelResult> {
        Ok(self.get(model_id)?.result.clone())
    }

    /// Register the persisted model at `path` under `model_id`.
    ///
    /// The stored result's `model_path` is set to `path`.
    pub async fn load<P: AsRef<Path>>(&self, path: P, model_id: &str) -> LoResult<()> {
        validate_model_id(model_id)?;
        let path = path.as_ref();
        let persisted: PersistedModel = read_artifact(path).await?;

        let mut result = persisted.result;
        result.model_path = path.display().to_string();

        let _guard = self.lock_model(model_id).await;
        self.insert(model_id, Arc::new(persisted.artifact), result);
        self.stats.write().loads += 1;

        info!(
            model_id,
            source_id = %persisted.model_id,
            path = %path.display(),
            "model loaded"
        );
        Ok(())
    }

    /// Every registered model ordered by id.
    pub fn list(&self) -> Vec<(String, ModelResult)> {
        let mut models: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().result.clone()))
            .collect();
        models.sort_by(|a, b| a.0.cmp(&b.0));
        models
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.entries.contains_key(model_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats.read().clone()
    }
}
