//! Error types for this crate.
//!
//! All fallible operations return [`Result<T>`] which uses [`StanceError`] as the error type.

use thiserror::Error;

/// A [`Result`](std::result::Result) alias using [`StanceError`] as the error type.
pub type Result<T> = std::result::Result<T, StanceError>;

/// The unified error type for all crate errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StanceError {
    /// Input table unreadable or missing the comment column.
    #[error("{0}")]
    Ingestion(String),

    /// Missing or rejected Hugging Face credential.
    #[error("{0}")]
    Auth(String),

    /// Network or download failure. Retry may help.
    #[error("{0}")]
    Download(String),

    /// Device initialization failure. Fall back to CPU.
    #[error("{0}")]
    Device(String),

    /// Invalid prompt spec or generation configuration.
    #[error("{0}")]
    Config(String),

    /// Chat templating or tokenization failure. Check input text.
    #[error("{0}")]
    Encoding(String),

    /// Model forward pass or sampling failure.
    #[error("{0}")]
    Generation(String),

    /// The model reply contained no tokens to extract a label from.
    #[error("completion contained no tokens")]
    EmptyCompletion,

    /// Output table could not be written. No partial file is left behind.
    #[error("{0}")]
    Persistence(String),

    /// Internal error. Report if seen.
    #[error("{0}")]
    Unexpected(String),
}

impl From<hf_hub::api::sync::ApiError> for StanceError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        StanceError::Download(format!("HuggingFace API error: {}", value))
    }
}

impl From<candle_core::Error> for StanceError {
    fn from(value: candle_core::Error) -> Self {
        StanceError::Generation(value.to_string())
    }
}

impl From<std::io::Error> for StanceError {
    fn from(value: std::io::Error) -> Self {
        StanceError::Unexpected(value.to_string())
    }
}

impl From<serde_json::Error> for StanceError {
    fn from(value: serde_json::Error) -> Self {
        StanceError::Unexpected(value.to_string())
    }
}
