//! Risk classification and human approval.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use warden_approval::{ApprovalGate, ApprovalRequest, RiskClassifier};

use crate::result::HookResult;
use crate::validator::{HookFault, PreStage, Validator};

/// Suspends risky calls on the approval gate.
#[derive(Debug, Clone)]
pub struct RiskGateValidator {
    classifier: Arc<RiskClassifier>,
    gate: ApprovalGate,
}

impl RiskGateValidator {
    /// Create the validator.
    #[must_use]
    pub fn new(classifier: Arc<RiskClassifier>, gate: ApprovalGate) -> Self {
        Self { classifier, gate }
    }
}

#[async_trait]
impl Validator for RiskGateValidator {
    fn name(&self) -> &'static str {
        "risk_gate"
    }

    async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault> {
        let invocation = &stage.invocation;
        let classification = self
            .classifier
            .classify_invocation(&invocation.tool_name, &invocation.args);
        if !classification.requires_approval {
            debug!(tool = %invocation.tool_name, tier = %classification.tier, "No approval needed");
            return Ok(HookResult::continue_());
        }

        let request = ApprovalRequest::new(
            invocation.session_id.clone(),
            invocation.tool_name.clone(),
            classification,
        )
        .with_intent(stage.authorized_intent.as_ref().map(|i| i.id.clone()));

        let outcome = self.gate.request_approval(request).await;
        Ok(outcome
            .denial(&invocation.tool_name)
            .map_or_else(HookResult::continue_, HookResult::deny))
    }
}
