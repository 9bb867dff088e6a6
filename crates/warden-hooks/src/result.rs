//! Hook results.

use serde::Serialize;
use serde_json::{Map, Value};
use warden_core::{DenialCode, PolicyDenial};

/// Verdict of one hook, or of a whole stage.
///
/// A result that does not continue always carries a [`DenialCode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookResult {
    #[serde(rename = "continue")]
    proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<DenialCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified_args: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl Default for HookResult {
    fn default() -> Self {
        Self::continue_()
    }
}

impl HookResult {
    /// Let the call proceed unchanged.
    #[must_use]
    pub fn continue_() -> Self {
        Self {
            proceed: true,
            code: None,
            reason: None,
            modified_args: None,
            context: None,
        }
    }

    /// Stop the call.
    #[must_use]
    pub fn deny(denial: PolicyDenial) -> Self {
        Self {
            proceed: false,
            code: Some(denial.code),
            reason: Some(denial.reason),
            modified_args: None,
            context: None,
        }
    }

    /// Stop the call with a code and reason.
    #[must_use]
    pub fn block(code: DenialCode, reason: impl Into<String>) -> Self {
        Self::deny(PolicyDenial::new(code, reason))
    }

    /// Surface extra context to the caller.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Overlay arguments for the rest of the chain and the executor.
    #[must_use]
    pub fn with_modified_args(mut self, args: Map<String, Value>) -> Self {
        self.modified_args = Some(args);
        self
    }

    /// Whether the call may proceed.
    #[must_use]
    pub fn proceeds(&self) -> bool {
        self.proceed
    }

    /// Whether this result stops the call.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        !self.proceed
    }

    /// Denial code, when blocking.
    #[must_use]
    pub fn code(&self) -> Option<DenialCode> {
        self.code
    }

    /// Human-readable reason.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Argument overlay.
    #[must_use]
    pub fn modified_args(&self) -> Option<&Map<String, Value>> {
        self.modified_args.as_ref()
    }

    /// Context for the caller.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The denial this result represents, if it blocks.
    #[must_use]
    pub fn denial(&self) -> Option<PolicyDenial> {
        if self.proceed {
            return None;
        }
        self.code.map(|code| {
            PolicyDenial::new(code, self.reason.clone().unwrap_or_default())
        })
    }
}

impl From<PolicyDenial> for HookResult {
    fn from(denial: PolicyDenial) -> Self {
        Self::deny(denial)
    }
}
