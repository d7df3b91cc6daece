//! Error types for the mirror.

use thiserror::Error;

/// Main error type for mirror operations.
///
/// Only contract violations surface here. Cache misses, corrupt cache
/// entries and already-covered subscriptions degrade silently instead.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror state is not mounted where the configured mount selector expects it")]
    NotMounted,

    #[error("a path is required to {0}")]
    MissingPath(&'static str),

    #[error("no async runtime is available to schedule sync timers")]
    NoRuntime,

    #[error("fetch did not converge after {rounds} rounds")]
    FetchDidNotConverge { rounds: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
