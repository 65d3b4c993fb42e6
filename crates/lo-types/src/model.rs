use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Backend name plus the winning hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub backend: String,
    pub params: BTreeMap<String, serde_json::Value>,
}

/// Outcome of one training call.
///
/// The fitted artifact itself lives next to this record in the registry and in
/// the persisted model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    /// Objective on the held-out partition (accuracy or R²).
    pub score: f64,
    pub metrics: BTreeMap<String, f64>,
    /// Empty when the fitted model has no notion of importance.
    pub feature_importance: BTreeMap<String, f64>,
    pub config: BackendConfig,
    pub model_path: String,
}

impl ModelResult {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_result_wire_shape() {
        let mut metrics = BTreeMap::new();
        metrics.insert("accuracy".to_string(), 0.9);
        metrics.insert("weighted_f1".to_string(), 0.88);

        let mut params = BTreeMap::new();
        params.insert("max_depth".to_string(), serde_json::json!(4));

        let result = ModelResult {
            score: 0.9,
            metrics,
            feature_importance: BTreeMap::new(),
            config: BackendConfig {
                backend: "gbt_a".to_string(),
                params,
            },
            model_path: "/tmp/models/automl_0.json".to_string(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["score"], 0.9);
        assert_eq!(json["metrics"]["weighted_f1"], 0.88);
        assert_eq!(json["config"]["backend"], "gbt_a");
        assert_eq!(json["config"]["params"]["max_depth"], 4);
        assert_eq!(json["model_path"], "/tmp/models/automl_0.json");
        assert!(json["feature_importance"].as_object().unwrap().is_empty());
        assert_eq!(result.metric("accuracy"), Some(0.9));
    }
}
