//! Shared building blocks for adaptive multi-grid scene representation networks
//!
//! Holds the pieces that carry no tensor state: the configuration record,
//! the error taxonomy and small value types exchanged with the model crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::AmrConfig;
pub use error::{AmrError, Result};
pub use types::{GlobalRegion, GridShape, PlacementBounds};
