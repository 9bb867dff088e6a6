//! Test fixtures for common types.

use std::path::Path;

use serde_json::{Map, Value, json};
use warden_core::{Intent, IntentId, IntentStatus, SessionId};

/// An intent file with one active, one pending and one completed intent.
pub const SAMPLE_INTENTS_YAML: &str = r#"active_intents:
  - id: INT-001
    name: JWT authentication
    status: active
    owned_scope:
      - src/auth/**
    constraints:
      - keep the session cookie format
    acceptance_criteria:
      - login returns a signed token
    context: Replace the legacy session middleware.
  - id: INT-002
    name: Billing export
    status: pending
    owned_scope:
      - src/billing/**
      - tests/billing/**
  - id: INT-003
    name: Docs refresh
    status: completed
    owned_scope:
      - docs/**
"#;

/// The intents in [`SAMPLE_INTENTS_YAML`].
#[must_use]
pub fn sample_intents() -> Vec<Intent> {
    vec![
        auth_intent(),
        Intent::new("INT-002", "Billing export")
            .with_status(IntentStatus::Pending)
            .with_scope("src/billing/**")
            .with_scope("tests/billing/**"),
        Intent::new("INT-003", "Docs refresh")
            .with_status(IntentStatus::Completed)
            .with_scope("docs/**"),
    ]
}

/// The active `INT-001` intent owning `src/auth/**`.
#[must_use]
pub fn auth_intent() -> Intent {
    let mut intent = Intent::new("INT-001", "JWT authentication")
        .with_scope("src/auth/**")
        .with_constraint("keep the session cookie format")
        .with_context("Replace the legacy session middleware.");
    intent
        .acceptance_criteria
        .push("login returns a signed token".to_owned());
    intent
}

/// The id of [`auth_intent`].
#[must_use]
pub fn auth_intent_id() -> IntentId {
    IntentId::new("INT-001")
}

/// A fresh random session id.
#[must_use]
pub fn test_session() -> SessionId {
    SessionId::generate()
}

/// Write [`SAMPLE_INTENTS_YAML`] under `root` at the default location.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_sample_intents(root: &Path) -> std::path::PathBuf {
    let path = root.join(".orchestration/active_intents.yaml");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create {parent:?}: {e}"));
    }
    std::fs::write(&path, SAMPLE_INTENTS_YAML).unwrap_or_else(|e| panic!("write {path:?}: {e}"));
    path
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Arguments for `write_to_file`.
#[must_use]
pub fn write_args(path: &str, content: &str) -> Map<String, Value> {
    object(json!({ "path": path, "content": content }))
}

/// Arguments for `execute_command`.
#[must_use]
pub fn command_args(command: &str) -> Map<String, Value> {
    object(json!({ "command": command }))
}

/// Arguments for `apply_patch` updating each of `paths`.
#[must_use]
pub fn patch_args(paths: &[&str]) -> Map<String, Value> {
    let mut body = String::from("*** Begin Patch\n");
    for path in paths {
        body.push_str("*** Update File: ");
        body.push_str(path);
        body.push_str("\n@@\n-old\n+new\n");
    }
    body.push_str("*** End Patch\n");
    object(json!({ "patch": body }))
}
