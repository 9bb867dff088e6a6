//! Post-execution observers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use warden_approval::{RiskClassifier, ToolClass};
use warden_audit::{TraceInput, TraceWriter};
use warden_intent::{ScopeMatcher, normalize_path};

use crate::context::PostToolEvent;
use crate::validator::HookFault;

/// Something that reacts to a finished tool call.
///
/// Observers never affect the caller: errors are reported on the fault
/// channel and dropped.
#[async_trait]
pub trait Observer: Send + Sync {
    /// Name used in logs and fault reports.
    fn name(&self) -> &'static str;

    /// React to a finished call.
    async fn observe(&self, event: &PostToolEvent) -> Result<(), HookFault>;
}

/// Appends a trace record for every finished mutating call.
#[derive(Debug, Clone)]
pub struct TraceObserver {
    writer: Arc<TraceWriter>,
    classifier: Arc<RiskClassifier>,
}

impl TraceObserver {
    /// Create the observer.
    #[must_use]
    pub fn new(writer: Arc<TraceWriter>, classifier: Arc<RiskClassifier>) -> Self {
        Self { writer, classifier }
    }

    fn input(event: &PostToolEvent) -> TraceInput {
        let invocation = &event.invocation;
        let written_paths: Vec<String> = invocation
            .target_paths()
            .into_iter()
            .map(|p| normalize_path(&p).unwrap_or(p))
            .collect();

        // Only attribute the change when the intent owns every written path.
        let related_intents = event
            .authorized_intent
            .iter()
            .filter(|intent| {
                let matcher = ScopeMatcher::new(&intent.owned_scope);
                written_paths.iter().all(|p| matcher.is_match(p))
            })
            .map(|intent| intent.id.clone())
            .collect();

        TraceInput {
            session_id: invocation.session_id.clone(),
            tool_name: invocation.tool_name.clone(),
            args: invocation.args.clone(),
            cwd: invocation.cwd.clone(),
            written_paths,
            related_intents,
            success: event.success,
            duration: event.duration,
        }
    }
}

#[async_trait]
impl Observer for TraceObserver {
    fn name(&self) -> &'static str {
        "audit_trace"
    }

    async fn observe(&self, event: &PostToolEvent) -> Result<(), HookFault> {
        let invocation = &event.invocation;
        if self
            .classifier
            .classify_tool(&invocation.tool_name, &invocation.args)
            != ToolClass::Destructive
        {
            return Ok(());
        }

        let input = Self::input(event);
        let writer = Arc::clone(&self.writer);
        let record = tokio::task::spawn_blocking(move || writer.record(&input))
            .await
            .map_err(|e| HookFault::Internal(format!("trace task failed: {e}")))??;
        debug!(
            record_id = %record.id,
            invocation_id = %invocation.invocation_id,
            "Mutation traced"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use warden_audit::read_trace;
    use warden_core::{Intent, SessionId};
    use warden_test::fixtures;

    use crate::context::ToolInvocation;

    fn observer(root: &std::path::Path) -> TraceObserver {
        let writer = TraceWriter::open(root.join("trace.jsonl"))
            .unwrap()
            .with_revision_capture(false);
        TraceObserver::new(Arc::new(writer), Arc::new(RiskClassifier::default()))
    }

    fn event(
        root: &std::path::Path,
        tool: &str,
        args: serde_json::Map<String, serde_json::Value>,
        intent: Option<Intent>,
    ) -> PostToolEvent {
        PostToolEvent::new(
            ToolInvocation::new(SessionId::new("s1"), tool, args, root),
            true,
            Duration::from_millis(5),
        )
        .with_intent(intent)
    }

    #[tokio::test]
    async fn test_mutation_is_traced_with_intent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/auth")).unwrap();
        std::fs::write(dir.path().join("src/auth/a.ts"), "body").unwrap();
        let observer = observer(dir.path());
        observer
            .observe(&event(
                dir.path(),
                "write_to_file",
                fixtures::write_args("./src/auth/a.ts", "body"),
                Some(fixtures::auth_intent()),
            ))
            .await
            .unwrap();

        let log = read_trace(&dir.path().join("trace.jsonl")).unwrap();
        assert_eq!(log.records.len(), 1);
        let record = &log.records[0];
        assert_eq!(record.related_intents, vec![fixtures::auth_intent_id()]);
        assert_eq!(record.ranges[0].path, "src/auth/a.ts");
    }

    #[tokio::test]
    async fn test_out_of_scope_write_is_not_attributed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.ts"), "x").unwrap();
        let observer = observer(dir.path());
        observer
            .observe(&event(
                dir.path(),
                "write_to_file",
                fixtures::write_args("b.ts", "x"),
                Some(fixtures::auth_intent()),
            ))
            .await
            .unwrap();
        let log = read_trace(&dir.path().join("trace.jsonl")).unwrap();
        assert!(log.records[0].related_intents.is_empty());
    }

    #[tokio::test]
    async fn test_read_only_tools_are_not_traced() {
        let dir = tempfile::tempdir().unwrap();
        let observer = observer(dir.path());
        observer
            .observe(&event(
                dir.path(),
                "read_file",
                fixtures::write_args("a.ts", ""),
                None,
            ))
            .await
            .unwrap();
        let log = read_trace(&dir.path().join("trace.jsonl")).unwrap();
        assert!(log.records.is_empty());
    }
}
