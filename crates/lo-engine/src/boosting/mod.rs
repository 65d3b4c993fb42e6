//! Histogram gradient boosting shared by the tree backends.
//!
//! The three tree families differ only in how a tree is grown, see
//! [`GrowthStrategy`]; binning, gradients and the boosting loop are common.

pub mod binning;
pub mod grower;
pub mod loss;
pub mod split;
pub mod trainer;
pub mod tree;

pub use grower::GrowthStrategy;
pub use loss::Objective;
pub use trainer::{BoostedModel, BoostingParams, ImportanceKind};
pub use tree::Tree;
