//! Error taxonomy shared by the workspace

use thiserror::Error;

/// Errors raised while building, running, exporting or restoring a model
#[derive(Error, Debug)]
pub enum AmrError {
    /// Missing or out-of-range hyperparameter
    #[error("configuration error: {0}")]
    Config(String),

    /// The comma-separated grid shape could not be used
    #[error("invalid feature grid shape {spec:?}: {reason}")]
    InvalidGridShape { spec: String, reason: String },

    /// Coordinate batch axis size does not match the configured dimensionality
    #[error("invalid coordinate dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    /// A tensor handed to the model has the wrong shape
    #[error("shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// A sub-grid scale collapsed, so its transform cannot be inverted
    #[error("degenerate scale {scale} on axis {axis} of grid {grid}")]
    DegenerateScale { grid: usize, axis: usize, scale: f32 },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AmrError>;
