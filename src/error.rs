//! Error types for the recwalk harness
//!
//! Errors are defined with thiserror. Only configuration problems and
//! infrastructure failures (I/O, codecs, stores) abort a run; data gaps,
//! unknown clients, empty candidate sets and training failures are handled
//! inside the harness and surface in the run report instead.

use thiserror::Error;

/// Main error type for recwalk operations
#[derive(Error, Debug)]
pub enum RecwalkError {
    /// Invalid harness configuration, raised before the schedule starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary model-state encoding error
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Scorer failed while learning a window
    #[error("Training failed: {0}")]
    Training(String),

    /// Checkpoint is unusable (wrong scorer kind, corrupt state, ...)
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Resource already exists (checkpoints are immutable)
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for recwalk operations
pub type Result<T> = std::result::Result<T, RecwalkError>;

/// Convert anyhow::Error to RecwalkError
impl From<anyhow::Error> for RecwalkError {
    fn from(err: anyhow::Error) -> Self {
        RecwalkError::Other(err.to_string())
    }
}

impl RecwalkError {
    /// Whether this error must abort the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RecwalkError::Training(_) | RecwalkError::Checkpoint(_))
    }
}
