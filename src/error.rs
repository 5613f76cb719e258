use thiserror::Error;

/// Failure kinds shared by the source, feature, model and prediction layers.
///
/// Only `NotFound` for the player query ever leaves the pipeline as an error;
/// the other kinds are recorded in reports and degraded around.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("insufficient data for {target}: {samples} samples (need at least {required})")]
    InsufficientData {
        target: String,
        samples: usize,
        required: usize,
    },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl PipelineError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable(err.to_string())
    }
}
