//! Service-level configuration.

use std::path::{Path, PathBuf};

use lo_types::{config_error, LoResult};
use serde::{Deserialize, Serialize};

pub const MODEL_DIR_ENV: &str = "LUMINAOPS_MODEL_DIR";
pub const MAX_WORKERS_ENV: &str = "LUMINAOPS_MAX_WORKERS";

/// Settings shared by every training call of one service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding one persisted file per model id.
    pub model_dir: PathBuf,
    /// Upper bound on concurrently running CPU-bound jobs.
    pub max_workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let model_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("luminaops")
            .join("models");
        let max_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            model_dir,
            max_workers,
        }
    }
}

impl ServiceConfig {
    /// Defaults, overridden by `LUMINAOPS_MODEL_DIR` and `LUMINAOPS_MAX_WORKERS`.
    pub fn from_env() -> LoResult<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var(MODEL_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.model_dir = PathBuf::from(dir);
            }
        }
        if let Ok(raw) = std::env::var(MAX_WORKERS_ENV) {
            config.max_workers = parse_max_workers(&raw)?;
        }

        Ok(config)
    }

    pub fn with_model_dir<P: AsRef<Path>>(mut self, model_dir: P) -> Self {
        self.model_dir = model_dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }
}

fn parse_max_workers(raw: &str) -> LoResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(config_error!(
            "{MAX_WORKERS_ENV} must be a positive integer, got {raw:?}"
        )),
    }
}
