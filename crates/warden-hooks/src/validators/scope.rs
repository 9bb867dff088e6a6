//! Owned-scope enforcement.

use async_trait::async_trait;
use tracing::debug;
use warden_core::DenialCode;
use warden_intent::ScopeMatcher;

use crate::result::HookResult;
use crate::validator::{HookFault, PreStage, Validator};

/// Denies writes to paths the authorized intent does not own.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeValidator;

#[async_trait]
impl Validator for ScopeValidator {
    fn name(&self) -> &'static str {
        "scope"
    }

    async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault> {
        if !stage.is_destructive() {
            return Ok(HookResult::continue_());
        }
        let Some(intent) = &stage.authorized_intent else {
            return Ok(HookResult::continue_());
        };
        if let Some(foreign) = stage.invocation.foreign_paths().first() {
            return Ok(HookResult::block(
                DenialCode::ScopeViolation,
                format!(
                    "{foreign} is outside the workspace {}",
                    stage.invocation.workspace().display()
                ),
            ));
        }
        let paths = stage.invocation.target_paths();
        if paths.is_empty() {
            return Ok(HookResult::continue_());
        }

        let matcher = ScopeMatcher::new(&intent.owned_scope);
        for path in &paths {
            match matcher.first_match(path) {
                Some(pattern) => {
                    debug!(path = %path, pattern, intent_id = %intent.id, "Path in scope");
                },
                None => {
                    let owned = if intent.owned_scope.is_empty() {
                        "nothing".to_owned()
                    } else {
                        intent.owned_scope.join(", ")
                    };
                    return Ok(HookResult::block(
                        DenialCode::ScopeViolation,
                        format!(
                            "{path} is outside the scope of intent {} (owns: {owned})",
                            intent.id
                        ),
                    ));
                },
            }
        }
        Ok(HookResult::continue_())
    }
}
