use std::path::{Path, PathBuf};

use lo_types::{validation_error, LoResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

const ARTIFACT_EXTENSION: &str = "json";

/// File-backed store for fitted model artifacts, one file per model id.
#[derive(Debug)]
pub struct ArtifactStore {
    model_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(model_dir: P) -> LoResult<Self> {
        let model_dir = model_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&model_dir)?;

        Ok(Self { model_dir })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Storage path for a model id
    pub fn path_for(&self, model_id: &str) -> LoResult<PathBuf> {
        validate_model_id(model_id)?;
        Ok(self
            .model_dir
            .join(format!("{model_id}.{ARTIFACT_EXTENSION}")))
    }

    /// Serialize `value` to the model's file.
    ///
    /// The payload is written to a sibling temp file and renamed into place, so
    /// readers never observe a half-written artifact.
    pub async fn save<T: Serialize>(&self, model_id: &str, value: &T) -> LoResult<PathBuf> {
        let path = self.path_for(model_id)?;
        let tmp_path = path.with_extension(format!("{ARTIFACT_EXTENSION}.tmp"));

        let payload = serde_json::to_vec(value)?;
        tokio::fs::write(&tmp_path, &payload).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!(
            model_id,
            bytes = payload.len(),
            path = %path.display(),
            "artifact persisted"
        );
        Ok(path)
    }

    pub async fn load<T: DeserializeOwned>(&self, model_id: &str) -> LoResult<T> {
        let path = self.path_for(model_id)?;
        read_artifact(&path).await
    }

    /// Ids of every artifact currently in the model directory, sorted.
    pub fn list_model_ids(&self) -> LoResult<Vec<String>> {
        let mut ids = Vec::new();

        if !self.model_dir.exists() {
            return Ok(ids);
        }

        for entry in std::fs::read_dir(&self.model_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}

/// Read and deserialize an artifact from an arbitrary path.
pub async fn read_artifact<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> LoResult<T> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Model ids double as file names: ASCII alphanumerics, `-`, `_` and `.` only.
pub fn validate_model_id(model_id: &str) -> LoResult<()> {
    if model_id.is_empty() || model_id.len() > 128 {
        return Err(validation_error!(
            "model id must be 1-128 characters, got {}",
            model_id.len()
        ));
    }
    if model_id.starts_with('.') {
        return Err(validation_error!("model id may not start with '.': {model_id}"));
    }
    if let Some(bad) = model_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(validation_error!(
            "model id contains invalid character {bad:?}: {model_id}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lo_types::LoError;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        weights: Vec<f64>,
        name: String,
    }

    #[tokio::test]
    async fn test_storage_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path().join("models")).unwrap();

        let blob = Blob {
            weights: vec![0.1, -2.5e-7, 1.0 / 3.0],
            name: "m".to_string(),
        };
        let path = tokio_test::assert_ok!(store.save("automl_0", &blob).await);
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "automl_0.json");

        let back: Blob = store.load("automl_0").await.unwrap();
        assert_eq!(back, blob);

        let via_path: Blob = read_artifact(&path).await.unwrap();
        assert_eq!(via_path, blob);

        assert_eq!(store.list_model_ids().unwrap(), vec!["automl_0".to_string()]);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path()).unwrap();

        store.save("m", &vec![1, 2, 3]).await.unwrap();
        store.save("m", &vec![4]).await.unwrap();

        let back: Vec<i32> = store.load("m").await.unwrap();
        assert_eq!(back, vec![4]);
        assert_eq!(store.list_model_ids().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path()).unwrap();

        let result: LoResult<Blob> = store.load("absent").await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, LoError::Io(_)));
    }

    #[test]
    fn test_model_id_validation() {
        assert!(validate_model_id("automl_12").is_ok());
        assert!(validate_model_id("churn-v2.final").is_ok());
        assert!(validate_model_id("").is_err());
        assert!(validate_model_id("../etc/passwd").is_err());
        assert!(validate_model_id("a/b").is_err());
        assert!(validate_model_id(".hidden").is_err());
    }
}
