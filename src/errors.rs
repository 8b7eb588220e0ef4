/*!
 * Error types for the subtx library.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 *
 * Structural problems in model output are deliberately absent here: they are
 * reported as `Anomaly` values by the response parser and never abort a run.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// HTTP status attached to the failure, if the vendor answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Whether a transport-level retry is worth attempting
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::ConnectionError(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Errors raised by the persistence collaborator
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem failure while preparing the store location
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store could not be locked or is otherwise unusable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from explicit glossary operations
#[derive(Error, Debug)]
pub enum GlossaryError {
    /// Term keys must be non-empty after trimming
    #[error("Glossary term must not be empty")]
    EmptyTerm,

    /// The glossary could not be serialized for persistence
    #[error("Failed to serialize glossary: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persistence collaborator rejected the write
    #[error("Failed to persist glossary: {0}")]
    Storage(#[from] StorageError),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Batch size must be a positive integer
    #[error("Invalid batch size: {0} (must be greater than zero)")]
    InvalidBatchSize(usize),

    /// Two segments claim the same index
    #[error("Duplicate segment index: {0}")]
    DuplicateIndex(usize),

    /// An operation referenced an index the store does not hold
    #[error("Unknown segment index: {0}")]
    UnknownIndex(usize),

    /// A run is already active on this orchestrator
    #[error("A translation run is already in progress")]
    AlreadyRunning,

    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model answered with nothing usable
    #[error("Empty translation returned for segment {0}")]
    EmptyTranslation(usize),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the persistence layer
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error from a glossary operation
    #[error("Glossary error: {0}")]
    Glossary(#[from] GlossaryError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
