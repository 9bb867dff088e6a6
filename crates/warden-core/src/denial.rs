//! Policy denials.
//!
//! A denial is an expected outcome, not an error: it carries a stable code a
//! caller can branch on and a reason meant for the agent.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-parseable reason a tool call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialCode {
    /// Mutating call with no declared intent
    NoActiveIntent,
    /// Caller claimed an intent other than the session's
    IntentMismatch,
    /// Selected intent does not exist or cannot be bound
    IntentNotFound,
    /// Target path is outside the intent's owned scope
    ScopeViolation,
    /// Target file changed since the caller last read it
    OptimisticLockFail,
    /// A human said no
    HitlRejected,
    /// Nobody answered in time
    HitlTimeout,
}

impl DenialCode {
    /// Wire form of the code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoActiveIntent => "NO_ACTIVE_INTENT",
            Self::IntentMismatch => "INTENT_MISMATCH",
            Self::IntentNotFound => "INTENT_NOT_FOUND",
            Self::ScopeViolation => "SCOPE_VIOLATION",
            Self::OptimisticLockFail => "OPTIMISTIC_LOCK_FAIL",
            Self::HitlRejected => "HITL_REJECTED",
            Self::HitlTimeout => "HITL_TIMEOUT",
        }
    }
}

impl fmt::Display for DenialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {reason}")]
pub struct PolicyDenial {
    /// Stable code
    pub code: DenialCode,
    /// Human-readable explanation
    pub reason: String,
}

impl PolicyDenial {
    /// Create a denial.
    #[must_use]
    pub fn new(code: DenialCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}
