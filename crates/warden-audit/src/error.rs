//! Audit-related error types.

use thiserror::Error;

/// Errors from trace writing and write locking.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The file changed since the caller last read it.
    #[error("{path} changed since it was read (expected {expected}, found {actual})")]
    OptimisticLock {
        /// The contested file.
        path: String,
        /// Fingerprint the caller supplied.
        expected: String,
        /// Fingerprint on disk, or `absent`.
        actual: String,
    },

    /// A fingerprint string could not be parsed.
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
