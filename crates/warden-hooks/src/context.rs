//! Per-call invocation context.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use warden_core::{Intent, IntentId, SessionId};
use warden_intent::{normalize_path, workspace_relative};

/// Argument naming the intent a caller claims to be working under.
pub const CLAIMED_INTENT_KEY: &str = "intent_id";

/// Argument keys that carry the fingerprint the caller last read.
pub const EXPECTED_FINGERPRINT_KEYS: &[&str] = &[
    "expected_hash",
    "expected_content_hash",
    "expected_fingerprint",
];

/// One tool call as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Unique id for this call.
    pub invocation_id: Uuid,
    /// Owning session.
    pub session_id: SessionId,
    /// Tool name.
    pub tool_name: String,
    /// Effective arguments.
    pub args: Map<String, Value>,
    /// Workspace root.
    pub cwd: PathBuf,
    /// When the call was received.
    pub timestamp: DateTime<Utc>,
}

impl ToolInvocation {
    /// Create an invocation.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        tool_name: impl Into<String>,
        args: Map<String, Value>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            session_id,
            tool_name: tool_name.into(),
            args,
            cwd: cwd.into(),
            timestamp: Utc::now(),
        }
    }

    /// The intent the caller says it is working under.
    #[must_use]
    pub fn claimed_intent(&self) -> Option<IntentId> {
        self.args
            .get(CLAIMED_INTENT_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(IntentId::from)
    }

    /// The fingerprint the caller expects the target file to have.
    #[must_use]
    pub fn expected_fingerprint(&self) -> Option<&str> {
        EXPECTED_FINGERPRINT_KEYS.iter().find_map(|key| {
            self.args
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
    }

    /// Target paths relative to the workspace root, in argument order.
    ///
    /// Absolute paths outside the workspace are left out; see
    /// [`Self::foreign_paths`].
    #[must_use]
    pub fn target_paths(&self) -> Vec<String> {
        warden_approval::target_paths(&self.args)
            .iter()
            .filter_map(|p| workspace_relative(p, &self.cwd))
            .collect()
    }

    /// Absolute target paths that do not live under the workspace root.
    #[must_use]
    pub fn foreign_paths(&self) -> Vec<String> {
        warden_approval::target_paths(&self.args)
            .into_iter()
            .filter(|p| workspace_relative(p, &self.cwd).is_none())
            .collect()
    }

    /// Absolute location of a workspace-relative path, or `None` if it
    /// escapes the workspace.
    #[must_use]
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        normalize_path(relative).map(|n| self.cwd.join(n))
    }

    /// The workspace root.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.cwd
    }
}

/// A finished tool call, handed to observers.
#[derive(Debug, Clone)]
pub struct PostToolEvent {
    /// The call, with the arguments that were executed.
    pub invocation: ToolInvocation,
    /// Intent the pre-stage authorized the call under.
    pub authorized_intent: Option<Intent>,
    /// Whether the tool reported success.
    pub success: bool,
    /// Tool wall time.
    pub duration: Duration,
    /// Tool output, if the host shared it.
    pub output: Option<Value>,
}

impl PostToolEvent {
    /// Create an event.
    #[must_use]
    pub fn new(invocation: ToolInvocation, success: bool, duration: Duration) -> Self {
        Self {
            invocation,
            authorized_intent: None,
            success,
            duration,
            output: None,
        }
    }

    /// Attribute the call to an intent.
    #[must_use]
    pub fn with_intent(mut self, intent: Option<Intent>) -> Self {
        self.authorized_intent = intent;
        self
    }

    /// Attach the tool's output.
    #[must_use]
    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(args: Value) -> ToolInvocation {
        ToolInvocation::new(
            SessionId::new("s1"),
            "write_to_file",
            args.as_object().cloned().unwrap(),
            "/work/repo",
        )
    }

    #[test]
    fn test_claimed_intent() {
        assert_eq!(
            invocation(json!({ "intent_id": " INT-001 " })).claimed_intent(),
            Some(IntentId::new("INT-001"))
        );
        assert!(invocation(json!({ "intent_id": "" })).claimed_intent().is_none());
        assert!(invocation(json!({})).claimed_intent().is_none());
    }

    #[test]
    fn test_expected_fingerprint_keys() {
        let inv = invocation(json!({ "expected_content_hash": "sha256:abc" }));
        assert_eq!(inv.expected_fingerprint(), Some("sha256:abc"));
        assert!(invocation(json!({ "path": "a" })).expected_fingerprint().is_none());
    }

    #[test]
    fn test_target_paths_are_workspace_relative() {
        let inv = invocation(json!({ "path": "/work/repo/src/auth/a.ts" }));
        assert_eq!(inv.target_paths(), vec!["src/auth/a.ts"]);
        assert!(inv.foreign_paths().is_empty());
    }

    #[test]
    fn test_absolute_path_outside_workspace_is_foreign() {
        let inv = invocation(json!({ "path": "/src/auth/evil.ts" }));
        assert!(inv.target_paths().is_empty());
        assert_eq!(inv.foreign_paths(), vec!["/src/auth/evil.ts"]);
    }

    #[test]
    fn test_resolve() {
        let inv = invocation(json!({}));
        assert_eq!(
            inv.resolve("./src/../src/a.ts"),
            Some(PathBuf::from("/work/repo/src/a.ts"))
        );
        assert_eq!(inv.resolve("../outside"), None);
    }
}
