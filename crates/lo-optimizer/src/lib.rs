//! # lo-optimizer
//!
//! Hyperparameter search for LuminaOps.
//!
//! Provides search space definitions, seeded proposal strategies (random and
//! tree-structured Parzen estimation), trial bookkeeping, and the sequential
//! trial loop that backends drive with their own objective.

mod optimizer;
mod search;
mod trial;

pub use optimizer::{OptimizationOutcome, TrialOptimizer};
pub use search::{
    Candidate, Domain, Hyperparameter, ParameterValue, RandomSearch, Scale, SearchSpace,
    SearchStrategy, TpeSearch,
};
pub use trial::{
    ObjectiveDirection, OptimizationConfig, OptimizationId, OptimizationState,
    OptimizationStatus, StrategyKind, TrialRecord, TrialStatus,
};
