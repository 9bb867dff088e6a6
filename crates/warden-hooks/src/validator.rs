//! Pre-stage validator interface.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use warden_approval::ToolClass;
use warden_audit::{AuditError, WriteLease};
use warden_core::Intent;
use warden_intent::IntentError;

use crate::context::ToolInvocation;
use crate::result::HookResult;

/// A hook that failed to reach a verdict.
///
/// Faults are not denials: the pipeline logs them and moves on.
#[derive(Debug, Error)]
pub enum HookFault {
    /// The session registry failed.
    #[error("intent registry error: {0}")]
    Intent(#[from] IntentError),

    /// Fingerprinting or trace writing failed.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

/// State accumulated while the pre-stage runs.
#[derive(Debug)]
pub struct PreStage {
    /// The call, with every overlay applied so far.
    pub invocation: ToolInvocation,
    /// Whether the call needs an intent.
    pub tool_class: ToolClass,
    /// Intent the call is authorized under, once established.
    pub authorized_intent: Option<Intent>,
    /// Write leases taken for the call's target paths.
    pub leases: Vec<WriteLease>,
    /// Context strings to hand back to the caller.
    pub context: Vec<String>,
    pub(crate) args_modified: bool,
}

impl PreStage {
    /// Start a stage for an invocation.
    #[must_use]
    pub fn new(invocation: ToolInvocation, tool_class: ToolClass) -> Self {
        Self {
            invocation,
            tool_class,
            authorized_intent: None,
            leases: Vec::new(),
            context: Vec::new(),
            args_modified: false,
        }
    }

    /// Whether the call mutates the workspace.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.tool_class == ToolClass::Destructive
    }

    /// Fold a non-blocking result into the stage.
    pub fn absorb(&mut self, result: &HookResult) {
        if let Some(overlay) = result.modified_args() {
            merge_args(&mut self.invocation.args, overlay);
            self.args_modified = true;
        }
        if let Some(context) = result.context() {
            self.context.push(context.to_owned());
        }
    }
}

fn merge_args(args: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        args.insert(key.clone(), value.clone());
    }
}

/// One ordered pre-execution check.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Name used in logs and fault reports.
    fn name(&self) -> &'static str;

    /// Inspect (and possibly extend) the stage.
    ///
    /// Return a blocking [`HookResult`] to deny the call. Return an error only
    /// when no verdict could be reached.
    async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault>;
}
