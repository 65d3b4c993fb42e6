// LuminaOps AutoML engine
// Backends, training orchestration and the model registry

pub mod artifact;
pub mod backends;
pub mod boosting;
pub mod config;
pub mod encoding;
pub mod linear;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod worker;

pub use artifact::{Artifact, PersistedModel};
pub use backends::{backend_for, FittedBackend, Learner, TrainingBackend, TrainingTask};
pub use config::ServiceConfig;
pub use metrics::{evaluate, metric_value, Evaluation};
pub use orchestrator::TrainingOrchestrator;
pub use pipeline::run_pipeline;
pub use registry::{ModelRegistry, ModelWriteGuard, RegistryEntry, RegistryStats};
