//! Intent declaration and owned-scope enforcement through the full pipeline.

mod common;

use common::{FsExecutor, GovernedHarness};
use serde_json::json;
use warden_core::{DenialCode, Intent, SessionId};
use warden_hooks::HookResult;
use warden_test::fixtures;

fn denial_code(result: &HookResult) -> Option<DenialCode> {
    result.denial().map(|d| d.code)
}

#[tokio::test]
async fn test_write_without_intent_denied() {
    let harness = GovernedHarness::new();
    let session = SessionId::generate();

    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args("src/auth/login.ts", "x"),
        ))
        .await;

    assert_eq!(denial_code(&outcome.result), Some(DenialCode::NoActiveIntent));
    assert!(outcome.result.reason().unwrap().contains("select_active_intent"));
    assert!(harness.read_file("src/auth/login.ts").is_none());
}

#[tokio::test]
async fn test_command_without_intent_denied() {
    let harness = GovernedHarness::new();
    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &SessionId::generate(),
            "execute_command",
            fixtures::command_args("npm test"),
        ))
        .await;
    assert_eq!(denial_code(&outcome.result), Some(DenialCode::NoActiveIntent));
}

#[tokio::test]
async fn test_read_only_tools_need_no_intent() {
    let harness = GovernedHarness::new();
    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &SessionId::generate(),
            "read_file",
            serde_json::Map::from_iter([("path".to_owned(), json!("src/utils/x.ts"))]),
        ))
        .await;
    assert!(outcome.is_allowed());
    assert_eq!(outcome.lease_count(), 0);
}

#[tokio::test]
async fn test_select_active_intent_then_write() {
    let harness = GovernedHarness::new();
    let session = SessionId::generate();

    let selection = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "select_active_intent",
            serde_json::Map::from_iter([("intent_id".to_owned(), json!("INT-001"))]),
        ))
        .await;
    assert!(selection.is_allowed());
    let context = selection.result.context().unwrap();
    assert!(context.contains("<intent_context id=\"INT-001\">"));
    assert!(context.contains("src/auth/**"));

    let write = harness
        .pipeline
        .invoke(
            harness.call(
                &session,
                "write_to_file",
                fixtures::write_args("src/auth/login.ts", "export {}"),
            ),
            &FsExecutor,
        )
        .await
        .unwrap();
    assert!(write.output.success);
    assert_eq!(harness.read_file("src/auth/login.ts").as_deref(), Some("export {}"));
}

#[tokio::test]
async fn test_select_unknown_or_completed_intent() {
    let harness = GovernedHarness::new();
    let session = SessionId::generate();
    for id in ["INT-404", "INT-003"] {
        let outcome = harness
            .pipeline
            .pre_tool_use(harness.call(
                &session,
                "select_active_intent",
                serde_json::Map::from_iter([("intent_id".to_owned(), json!(id))]),
            ))
            .await;
        assert_eq!(denial_code(&outcome.result), Some(DenialCode::IntentNotFound));
    }
    assert!(harness.registry.get_active_intent(&session).is_none());
}

#[tokio::test]
async fn test_claimed_intent_must_match_declaration() {
    let harness = GovernedHarness::new();
    let session = harness.session_with("INT-001");
    let mut args = fixtures::write_args("src/auth/login.ts", "x");
    args.insert("intent_id".to_owned(), json!("INT-002"));

    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(&session, "write_to_file", args))
        .await;
    assert_eq!(denial_code(&outcome.result), Some(DenialCode::IntentMismatch));
}

#[tokio::test]
async fn test_in_scope_allowed_out_of_scope_denied() {
    let harness = GovernedHarness::new();
    let session = harness.session_with("INT-001");

    let inside = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args("src/auth/jwt/sign.ts", "x"),
        ))
        .await;
    assert!(inside.is_allowed());
    drop(inside);

    let outside = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args("src/utils/helpers.ts", "x"),
        ))
        .await;
    assert_eq!(denial_code(&outside.result), Some(DenialCode::ScopeViolation));
    let reason = outside.result.reason().unwrap();
    assert!(reason.contains("src/utils/helpers.ts"));
    assert!(reason.contains("INT-001"));
}

#[tokio::test]
async fn test_absolute_and_traversal_paths() {
    let harness = GovernedHarness::new();
    let session = harness.session_with("INT-001");

    let absolute = harness.root().join("src/auth/abs.ts");
    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args(absolute.to_str().unwrap(), "x"),
        ))
        .await;
    assert!(outcome.is_allowed());
    drop(outcome);

    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args("src/auth/../../etc/passwd", "x"),
        ))
        .await;
    assert_eq!(denial_code(&outcome.result), Some(DenialCode::ScopeViolation));
}

#[tokio::test]
async fn test_absolute_path_outside_workspace_denied() {
    let harness = GovernedHarness::new();
    let session = harness.session_with("INT-001");

    // Rooted at `/`, so it only looks like the owned `src/auth/**`.
    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args("/src/auth/evil.ts", "x"),
        ))
        .await;
    assert_eq!(denial_code(&outcome.result), Some(DenialCode::ScopeViolation));
    assert!(outcome.result.reason().unwrap().contains("outside the workspace"));
    drop(outcome);

    assert!(harness.trace().await.records.is_empty());
}

#[tokio::test]
async fn test_patch_touching_foreign_file_denied() {
    let harness = GovernedHarness::new();
    let session = harness.session_with("INT-001");

    let allowed = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "apply_patch",
            fixtures::patch_args(&["src/auth/a.ts", "src/auth/b.ts"]),
        ))
        .await;
    assert!(allowed.is_allowed());
    assert_eq!(allowed.lease_count(), 2);
    drop(allowed);

    let denied = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "apply_patch",
            fixtures::patch_args(&["src/auth/a.ts", "src/billing/invoice.ts"]),
        ))
        .await;
    assert_eq!(denial_code(&denied.result), Some(DenialCode::ScopeViolation));
    assert!(denied.result.reason().unwrap().contains("src/billing/invoice.ts"));
    assert_eq!(denied.lease_count(), 0);
}

#[tokio::test]
async fn test_empty_scope_owns_nothing() {
    let harness = GovernedHarness::with_intents(vec![Intent::new("INT-100", "Research spike")]);
    let session = harness.session_with("INT-100");

    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args("README.md", "x"),
        ))
        .await;
    assert_eq!(denial_code(&outcome.result), Some(DenialCode::ScopeViolation));
    assert!(outcome.result.reason().unwrap().contains("owns: nothing"));
}

#[tokio::test]
async fn test_completed_intent_stops_authorizing() {
    let harness = GovernedHarness::new();
    let session = harness.session_with("INT-001");

    let intents = harness.root().join(".orchestration/active_intents.yaml");
    let yaml = std::fs::read_to_string(&intents)
        .unwrap()
        .replacen("status: active", "status: completed", 1);
    std::fs::write(&intents, yaml).unwrap();
    harness.registry.catalog().reload();

    let outcome = harness
        .pipeline
        .pre_tool_use(harness.call(
            &session,
            "write_to_file",
            fixtures::write_args("src/auth/login.ts", "x"),
        ))
        .await;
    assert_eq!(denial_code(&outcome.result), Some(DenialCode::NoActiveIntent));
    assert!(outcome.result.reason().unwrap().contains("INT-001"));
}
