//! Optimistic write locking.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use warden_audit::{AuditError, ContentHash, PathLocks};
use warden_core::DenialCode;

use crate::result::HookResult;
use crate::validator::{HookFault, PreStage, Validator};

/// Takes a write lease on every target path and checks the caller's
/// expected fingerprint against the primary one.
///
/// Leases are granted in path order so two calls touching the same files
/// cannot deadlock. They stay on the stage until the call is recorded.
#[derive(Debug, Clone, Default)]
pub struct OptimisticLockValidator {
    locks: PathLocks,
}

impl OptimisticLockValidator {
    /// Create the validator over a shared lock table.
    #[must_use]
    pub fn new(locks: PathLocks) -> Self {
        Self { locks }
    }
}

#[async_trait]
impl Validator for OptimisticLockValidator {
    fn name(&self) -> &'static str {
        "optimistic_lock"
    }

    async fn validate(&self, stage: &mut PreStage) -> Result<HookResult, HookFault> {
        if !stage.is_destructive() {
            return Ok(HookResult::continue_());
        }
        let invocation = &stage.invocation;
        let mut targets: Vec<PathBuf> = invocation
            .target_paths()
            .iter()
            .filter_map(|p| invocation.resolve(p))
            .collect();
        let Some(primary) = targets.first().cloned() else {
            return Ok(HookResult::continue_());
        };

        let expected = match invocation.expected_fingerprint().map(ContentHash::parse) {
            None => None,
            Some(Ok(hash)) => Some(hash),
            Some(Err(e)) => {
                return Ok(HookResult::block(DenialCode::OptimisticLockFail, e.to_string()));
            },
        };

        targets.sort();
        targets.dedup();
        let mut leases = Vec::with_capacity(targets.len());
        for target in &targets {
            let expectation = if *target == primary {
                expected.as_ref()
            } else {
                None
            };
            match self.locks.acquire(target, expectation).await {
                Ok(lease) => leases.push(lease),
                Err(AuditError::OptimisticLock {
                    expected, actual, ..
                }) => {
                    let shown = target
                        .strip_prefix(&invocation.cwd)
                        .unwrap_or(target)
                        .display()
                        .to_string();
                    return Ok(HookResult::block(
                        DenialCode::OptimisticLockFail,
                        format!(
                            "{shown} changed since it was read (expected {expected}, found {actual}); re-read the file and retry"
                        ),
                    ));
                },
                Err(e) => return Err(e.into()),
            }
        }

        debug!(
            invocation_id = %invocation.invocation_id,
            leases = leases.len(),
            "Write leases held"
        );
        stage.leases.extend(leases);
        Ok(HookResult::continue_())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_approval::ToolClass;
    use warden_core::SessionId;
    use warden_test::fixtures;

    use crate::context::ToolInvocation;

    fn stage(root: &std::path::Path, args: serde_json::Map<String, serde_json::Value>) -> PreStage {
        PreStage::new(
            ToolInvocation::new(SessionId::new("s1"), "write_to_file", args, root),
            ToolClass::Destructive,
        )
    }

    fn with_expected(path: &str, hash: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut args = fixtures::write_args(path, "new");
        args.insert("expected_hash".into(), json!(hash));
        args
    }

    #[tokio::test]
    async fn test_lease_taken_without_expectation() {
        let dir = tempfile::tempdir().unwrap();
        let locks = PathLocks::new();
        let validator = OptimisticLockValidator::new(locks.clone());
        let mut stage = stage(dir.path(), fixtures::write_args("src/auth/a.ts", "x"));
        assert!(validator.validate(&mut stage).await.unwrap().proceeds());
        assert_eq!(stage.leases.len(), 1);
        assert_eq!(locks.len(), 1);
        drop(stage);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_matching_expectation_allowed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "old").unwrap();
        let hash = ContentHash::hash(b"old").to_string();
        let mut stage = stage(dir.path(), with_expected("a.ts", &hash));
        let result = OptimisticLockValidator::default()
            .validate(&mut stage)
            .await
            .unwrap();
        assert!(result.proceeds());
    }

    #[tokio::test]
    async fn test_stale_expectation_denied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "changed").unwrap();
        let hash = ContentHash::hash(b"old").to_hex();
        let mut stage = stage(dir.path(), with_expected("a.ts", &hash));
        let result = OptimisticLockValidator::default()
            .validate(&mut stage)
            .await
            .unwrap();
        assert_eq!(result.code(), Some(DenialCode::OptimisticLockFail));
        assert!(result.reason().unwrap().starts_with("a.ts changed"));
        assert!(stage.leases.is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.ts")).unwrap(), "changed");
    }

    #[tokio::test]
    async fn test_malformed_expectation_denied() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage = stage(dir.path(), with_expected("a.ts", "sha256:nothex"));
        let result = OptimisticLockValidator::default()
            .validate(&mut stage)
            .await
            .unwrap();
        assert_eq!(result.code(), Some(DenialCode::OptimisticLockFail));
    }

    #[tokio::test]
    async fn test_path_outside_workspace_not_leased() {
        let dir = tempfile::tempdir().unwrap();
        let locks = PathLocks::new();
        let validator = OptimisticLockValidator::new(locks.clone());
        let mut stage = stage(dir.path(), fixtures::write_args("/src/auth/evil.ts", "x"));
        assert!(validator.validate(&mut stage).await.unwrap().proceeds());
        assert!(stage.leases.is_empty());
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_patch_paths_all_leased() {
        let dir = tempfile::tempdir().unwrap();
        let mut stage = stage(dir.path(), fixtures::patch_args(&["b.ts", "a.ts", "b.ts"]));
        OptimisticLockValidator::default()
            .validate(&mut stage)
            .await
            .unwrap();
        let leased: Vec<_> = stage.leases.iter().map(|l| l.path().to_path_buf()).collect();
        assert_eq!(leased, vec![dir.path().join("a.ts"), dir.path().join("b.ts")]);
    }
}
