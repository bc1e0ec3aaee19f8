//! Error types for Mosaic.
//!
//! One enum covers every crate in the workspace. The retrieval-facing
//! variants (`StoreUnavailable`, `Embedding`, `Generator`, `Extraction`)
//! name the failure kinds the answering pipeline degrades around; each
//! component documents which of them it absorbs and which it surfaces.

use thiserror::Error;

/// Unified error type for Mosaic.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A modality store could not be reached or rejected the operation.
    #[error("Store unavailable ({modality}): {reason}")]
    StoreUnavailable { modality: String, reason: String },

    /// Text or cross-modal embedding failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The answer generator failed or returned nothing usable.
    #[error("Generator error: {0}")]
    Generator(String),

    /// Citation extraction could not complete.
    #[error("Citation extraction error: {0}")]
    Extraction(String),

    /// Prompt loading or rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// The request was cancelled before it completed.
    #[error("Request cancelled")]
    Cancelled,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Shorthand for a [`AppError::StoreUnavailable`] error.
    pub fn store(modality: impl Into<String>, reason: impl ToString) -> Self {
        AppError::StoreUnavailable {
            modality: modality.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
