//! Error types for balss-classifier
//!
//! Store and AI failures are terminal for the request that hit them.
//! An unknown category string is never an error (see `taxonomy`).

use thiserror::Error;

/// Persistent catalog unreachable or a write failed
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt catalog row: {0}")]
    CorruptRow(String),

    #[error("Refusing to store category '{0}' outside the taxonomy")]
    UnvalidatedCategory(String),
}

/// External classifier failure
///
/// `Clone` because a single in-flight result may be handed to several
/// waiting requests.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Classifier request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Classifier returned no content")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Incomplete classification: expected {expected} items, got {got}")]
    Incomplete { expected: usize, got: usize },

    #[error("Classifier not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else {
            AiError::Network(err.to_string())
        }
    }
}

/// Error returned by every classifier operation
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("AI classification failed: {0}")]
    Ai(#[from] AiError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for ClassificationError {
    fn from(err: sqlx::Error) -> Self {
        ClassificationError::Store(StoreError::Database(err))
    }
}

/// Result type for classifier operations
pub type ClassificationResult<T> = Result<T, ClassificationError>;
