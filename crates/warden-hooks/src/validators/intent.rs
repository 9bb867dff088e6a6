//! Intent selection, declaration and consistency checks.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use warden_core::{DenialCode, IntentId};
use warden_intent::{IntentError, SessionRegistry};

use crate::result::HookResult;
use crate::validator::{HookFault, PreStage, Validator};

/// Tool the agent calls to pick the intent it will work under.
pub const SELECT_INTENT_TOOL: &str = "select_active_intent";

/// Binds the session to the intent named by a `select_active_intent` call and
/// hands the intent's context back to the agent.
#[derive(Debug, Clone)]
pub struct IntentSelectionValidator {
    registry: SessionRegistry,
}

impl IntentSelectionValidator {
    /// Create the validator.
    #[must_use]
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Validator for IntentSelectionValidator {
    fn name(&self) -> &'static str {
        "intent_selection"
    }

    async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault> {
        if stage.invocation.tool_name != SELECT_INTENT_TOOL {
            return Ok(HookResult::continue_());
        }

        let requested = ["intent_id", "id"].iter().find_map(|key| {
            stage
                .invocation
                .args
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        });
        let Some(requested) = requested.map(IntentId::from) else {
            return Ok(HookResult::block(
                DenialCode::IntentNotFound,
                "select_active_intent requires an intent_id",
            ));
        };

        match self
            .registry
            .declare_intent(&stage.invocation.session_id, &requested)
        {
            Ok(intent) => {
                info!(
                    session_id = %stage.invocation.session_id,
                    intent_id = %intent.id,
                    "Intent selected"
                );
                let context = intent.context_block();
                stage.authorized_intent = Some(intent);
                Ok(HookResult::continue_().with_context(context))
            },
            Err(IntentError::UnknownIntent { id }) => Ok(HookResult::block(
                DenialCode::IntentNotFound,
                format!("intent {id} is not declared in the intent catalog"),
            )),
            Err(IntentError::NotAssignable { id, status }) => Ok(HookResult::block(
                DenialCode::IntentNotFound,
                format!("intent {id} is {status} and cannot be selected"),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Denies mutating calls from sessions with no usable intent.
#[derive(Debug, Clone)]
pub struct IntentDeclaredValidator {
    registry: SessionRegistry,
}

impl IntentDeclaredValidator {
    /// Create the validator.
    #[must_use]
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Validator for IntentDeclaredValidator {
    fn name(&self) -> &'static str {
        "intent_declared"
    }

    async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault> {
        if !stage.is_destructive() {
            return Ok(HookResult::continue_());
        }
        let session = &stage.invocation.session_id;
        if let Some(intent) = self.registry.active_intent(session) {
            debug!(session_id = %session, intent_id = %intent.id, "Active intent resolved");
            stage.authorized_intent = Some(intent);
            return Ok(HookResult::continue_());
        }

        let reason = match self.registry.get_active_intent(session) {
            Some(stale) => format!(
                "{} requires an active intent; {stale} is no longer active. Call {SELECT_INTENT_TOOL} first",
                stage.invocation.tool_name
            ),
            None => format!(
                "{} requires an active intent. Call {SELECT_INTENT_TOOL} first",
                stage.invocation.tool_name
            ),
        };
        Ok(HookResult::block(DenialCode::NoActiveIntent, reason))
    }
}

/// Denies calls that claim a different intent than the session declared.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentConsistencyValidator;

#[async_trait]
impl Validator for IntentConsistencyValidator {
    fn name(&self) -> &'static str {
        "intent_consistency"
    }

    async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault> {
        if !stage.is_destructive() {
            return Ok(HookResult::continue_());
        }
        let (Some(claimed), Some(active)) =
            (stage.invocation.claimed_intent(), &stage.authorized_intent)
        else {
            return Ok(HookResult::continue_());
        };
        if claimed == active.id {
            return Ok(HookResult::continue_());
        }
        Ok(HookResult::block(
            DenialCode::IntentMismatch,
            format!(
                "call claims intent {claimed} but the session is working on {}",
                active.id
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::{Value, json};
    use warden_approval::ToolClass;
    use warden_core::SessionId;
    use warden_intent::IntentCatalog;
    use warden_test::fixtures;

    use crate::context::ToolInvocation;

    fn registry() -> SessionRegistry {
        SessionRegistry::in_memory(Arc::new(IntentCatalog::from_intents(
            fixtures::sample_intents(),
        )))
    }

    fn make_stage(tool: &str, args: Value, class: ToolClass) -> PreStage {
        PreStage::new(
            ToolInvocation::new(
                SessionId::new("s1"),
                tool,
                args.as_object().cloned().unwrap(),
                "/w",
            ),
            class,
        )
    }

    #[tokio::test]
    async fn test_selection_declares_and_injects_context() {
        let registry = registry();
        let validator = IntentSelectionValidator::new(registry.clone());
        let mut stage = make_stage(
            SELECT_INTENT_TOOL,
            json!({ "intent_id": "INT-001" }),
            ToolClass::Safe,
        );
        let result = validator.validate(&mut stage).await.unwrap();
        assert!(result.proceeds());
        assert!(result.context().unwrap().contains("<intent_context id=\"INT-001\">"));
        assert_eq!(
            registry.get_active_intent(&SessionId::new("s1")),
            Some(IntentId::new("INT-001"))
        );
    }

    #[tokio::test]
    async fn test_selection_of_unknown_intent_denied() {
        let validator = IntentSelectionValidator::new(registry());
        let mut stage = make_stage(
            SELECT_INTENT_TOOL,
            json!({ "intent_id": "INT-999" }),
            ToolClass::Safe,
        );
        let result = validator.validate(&mut stage).await.unwrap();
        assert_eq!(result.code(), Some(DenialCode::IntentNotFound));
    }

    #[tokio::test]
    async fn test_selection_of_completed_intent_denied() {
        let validator = IntentSelectionValidator::new(registry());
        let mut stage = make_stage(SELECT_INTENT_TOOL, json!({ "id": "INT-003" }), ToolClass::Safe);
        let result = validator.validate(&mut stage).await.unwrap();
        assert_eq!(result.code(), Some(DenialCode::IntentNotFound));
    }

    #[tokio::test]
    async fn test_selection_ignores_other_tools() {
        let validator = IntentSelectionValidator::new(registry());
        let mut stage = make_stage("read_file", json!({ "path": "a" }), ToolClass::Safe);
        assert!(validator.validate(&mut stage).await.unwrap().proceeds());
    }

    #[tokio::test]
    async fn test_declared_denies_without_intent() {
        let validator = IntentDeclaredValidator::new(registry());
        let mut stage = make_stage(
            "write_to_file",
            json!({ "path": "src/auth/a.ts" }),
            ToolClass::Destructive,
        );
        let result = validator.validate(&mut stage).await.unwrap();
        assert_eq!(result.code(), Some(DenialCode::NoActiveIntent));
        assert!(result.reason().unwrap().contains(SELECT_INTENT_TOOL));
    }

    #[tokio::test]
    async fn test_declared_allows_read_only_without_intent() {
        let validator = IntentDeclaredValidator::new(registry());
        let mut stage = make_stage("read_file", json!({ "path": "x" }), ToolClass::Safe);
        assert!(validator.validate(&mut stage).await.unwrap().proceeds());
    }

    #[tokio::test]
    async fn test_declared_sets_authorized_intent() {
        let registry = registry();
        registry
            .declare_intent(&SessionId::new("s1"), &fixtures::auth_intent_id())
            .unwrap();
        let validator = IntentDeclaredValidator::new(registry);
        let mut stage = make_stage("write_to_file", json!({}), ToolClass::Destructive);
        assert!(validator.validate(&mut stage).await.unwrap().proceeds());
        assert_eq!(
            stage.authorized_intent.map(|i| i.id),
            Some(fixtures::auth_intent_id())
        );
    }

    #[tokio::test]
    async fn test_consistency_detects_mismatch() {
        let mut stage = make_stage(
            "write_to_file",
            json!({ "intent_id": "INT-002" }),
            ToolClass::Destructive,
        );
        stage.authorized_intent = Some(fixtures::auth_intent());
        let result = IntentConsistencyValidator
            .validate(&mut stage)
            .await
            .unwrap();
        assert_eq!(result.code(), Some(DenialCode::IntentMismatch));
    }

    #[tokio::test]
    async fn test_consistency_accepts_matching_or_absent_claim() {
        let mut stage = make_stage(
            "write_to_file",
            json!({ "intent_id": "INT-001" }),
            ToolClass::Destructive,
        );
        stage.authorized_intent = Some(fixtures::auth_intent());
        assert!(IntentConsistencyValidator.validate(&mut stage).await.unwrap().proceeds());

        let mut stage = make_stage("write_to_file", json!({}), ToolClass::Destructive);
        stage.authorized_intent = Some(fixtures::auth_intent());
        assert!(IntentConsistencyValidator.validate(&mut stage).await.unwrap().proceeds());
    }
}
