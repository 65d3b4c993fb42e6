//! Declarative training configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{LoError, LoResult};

/// Kind of supervised problem being solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProblemType {
    Classification,
    Regression,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Regression => "regression",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemType {
    type Err = LoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(Self::Classification),
            "regression" => Ok(Self::Regression),
            other => Err(LoError::UnsupportedProblemType {
                problem_type: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ProblemType {
    type Error = LoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProblemType> for String {
    fn from(value: ProblemType) -> Self {
        value.as_str().to_string()
    }
}

/// The closed set of training backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Budgeted search across learner families.
    #[serde(alias = "flaml")]
    MetaSearch,
    /// Depth-wise boosted trees.
    #[serde(alias = "xgboost")]
    GbtA,
    /// Leaf-wise boosted trees.
    #[serde(alias = "lightgbm")]
    GbtB,
    /// Oblivious (symmetric) boosted trees.
    #[serde(alias = "catboost")]
    GbtC,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [Self::MetaSearch, Self::GbtA, Self::GbtB, Self::GbtC];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MetaSearch => "meta_search",
            Self::GbtA => "gbt_a",
            Self::GbtB => "gbt_b",
            Self::GbtC => "gbt_c",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = LoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meta_search" | "flaml" => Ok(Self::MetaSearch),
            "gbt_a" | "xgboost" => Ok(Self::GbtA),
            "gbt_b" | "lightgbm" => Ok(Self::GbtB),
            "gbt_c" | "catboost" => Ok(Self::GbtC),
            other => Err(LoError::Config(format!("unknown backend: {other}"))),
        }
    }
}

/// Evaluation metric a search can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    WeightedF1,
    R2,
    MeanSquaredError,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::WeightedF1 => "weighted_f1",
            Self::R2 => "r2",
            Self::MeanSquaredError => "mean_squared_error",
        }
    }

    pub fn default_for(problem_type: ProblemType) -> Self {
        match problem_type {
            ProblemType::Classification => Self::Accuracy,
            ProblemType::Regression => Self::R2,
        }
    }

    pub fn problem_type(&self) -> ProblemType {
        match self {
            Self::Accuracy | Self::WeightedF1 => ProblemType::Classification,
            Self::R2 | Self::MeanSquaredError => ProblemType::Regression,
        }
    }

    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Self::MeanSquaredError)
    }

    /// Map a raw metric value onto a scale where larger is always better.
    pub fn to_score(&self, value: f64) -> f64 {
        if self.higher_is_better() {
            value
        } else {
            -value
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = LoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Self::Accuracy),
            "weighted_f1" | "f1" | "f1_score" => Ok(Self::WeightedF1),
            "r2" => Ok(Self::R2),
            "mean_squared_error" | "mse" => Ok(Self::MeanSquaredError),
            other => Err(LoError::Config(format!("unknown metric: {other}"))),
        }
    }
}

/// Configuration for a single training call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub problem_type: ProblemType,
    pub backend: BackendKind,

    /// Wall-clock budget for any search, in seconds.
    pub time_budget_secs: u64,

    /// Selection metric name; defaults by problem type.
    pub metric_name: Option<String>,

    /// Fraction of rows held out for evaluation, in (0, 1).
    pub test_fraction: f64,

    pub random_seed: u64,

    /// Number of optimizer trials (or meta-search evaluations).
    pub trial_count: usize,

    pub early_stopping: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            problem_type: ProblemType::Classification,
            backend: BackendKind::MetaSearch,
            time_budget_secs: 300,
            metric_name: None,
            test_fraction: 0.2,
            random_seed: 42,
            trial_count: 100,
            early_stopping: true,
        }
    }
}

impl TrainingConfig {
    pub fn new(problem_type: ProblemType) -> Self {
        Self {
            problem_type,
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time_budget_secs(mut self, secs: u64) -> Self {
        self.time_budget_secs = secs;
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric_name = Some(metric.into());
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_trial_count(mut self, n: usize) -> Self {
        self.trial_count = n;
        self
    }

    pub fn with_early_stopping(mut self, enabled: bool) -> Self {
        self.early_stopping = enabled;
        self
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    /// Resolved selection metric.
    pub fn metric(&self) -> LoResult<Metric> {
        match &self.metric_name {
            None => Ok(Metric::default_for(self.problem_type)),
            Some(name) => name.parse(),
        }
    }

    pub fn validate(&self) -> LoResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(LoError::Config(format!(
                "test_fraction must lie in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.trial_count == 0 {
            return Err(LoError::Config("trial_count must be at least 1".to_string()));
        }
        if self.time_budget_secs == 0 {
            return Err(LoError::Config(
                "time_budget_secs must be at least 1".to_string(),
            ));
        }

        let metric = self.metric()?;
        if metric.problem_type() != self.problem_type {
            return Err(LoError::Config(format!(
                "metric {metric} does not apply to {} problems",
                self.problem_type
            )));
        }
        Ok(())
    }
}
