pub mod config;
pub mod dataset;
pub mod errors;
pub mod model;

pub use config::*;
pub use dataset::*;
pub use errors::*;
pub use model::*;
