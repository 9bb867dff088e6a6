//! Intent and registry error types.

use thiserror::Error;
use warden_core::{IntentId, IntentStatus};

/// Errors from the intent catalog and session registry.
#[derive(Debug, Error)]
pub enum IntentError {
    /// No intent with this identifier is declared.
    #[error("unknown intent: {id}")]
    UnknownIntent {
        /// Requested identifier
        id: IntentId,
    },

    /// The intent exists but its status does not allow binding.
    #[error("intent {id} is {status}; only active or pending intents can be selected")]
    NotAssignable {
        /// Intent identifier
        id: IntentId,
        /// Its current status
        status: IntentStatus,
    },

    /// The intent source could not be parsed.
    #[error("invalid intent source: {0}")]
    InvalidSource(String),

    /// The registry side file could not be written.
    #[error("registry persistence failed: {0}")]
    Persistence(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for intent operations.
pub type IntentResult<T> = Result<T, IntentError>;
