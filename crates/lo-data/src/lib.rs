//! # lo-data
//!
//! Tabular data sources, reproducible train/test partitioning and the
//! file-backed artifact store.

pub mod loaders;
pub mod split;
pub mod storage;

pub use loaders::*;
pub use split::*;
pub use storage::*;
