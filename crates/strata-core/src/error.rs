//! Error taxonomy for the compute engine.
//!
//! Everything here is fatal for the job that raised it: the engine produces
//! all-or-nothing outputs and never retries internally. Topological problems
//! with extracted meshes are *not* errors — they are repaired or logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrataError {
    /// Malformed input bytes or shapes: bad OFF data, non-triangular faces,
    /// DEM header mismatches, empty grids, resolutions below 2.
    #[error("invalid input: {0}")]
    InputShape(String),

    /// The implicit-field collaborator failed; carried verbatim.
    #[error("model evaluation failed: {0}")]
    ModelEvaluation(String),

    /// Mesh bytes in a format no registered codec understands.
    #[error("unsupported mesh format")]
    UnsupportedFormat,

    /// A tunnel trajectory expression failed to parse.
    #[error("invalid trajectory expression {expr:?}: {message}")]
    Expression { expr: String, message: String },

    /// The job was revoked by the task layer at a cooperative checkpoint.
    #[error("computation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, StrataError>;

impl StrataError {
    /// Shorthand for input-shape failures.
    pub fn input(msg: impl Into<String>) -> Self {
        StrataError::InputShape(msg.into())
    }
}
