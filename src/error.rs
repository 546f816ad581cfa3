//! Error types for leadgen-dispatch.
//!
//! Whole-batch failures only. A single webhook call failing inside a batch
//! is a [`crate::dispatch::CallError`] recorded in the outcome, never one
//! of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or unparsable. Raised before any
    /// outbound call is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller input has the wrong shape or is empty where it must not be.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A single-shot webhook (not a batch) answered with a non-success status.
    #[error("webhook failed: HTTP {status}: {details}")]
    Webhook { status: u16, details: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
