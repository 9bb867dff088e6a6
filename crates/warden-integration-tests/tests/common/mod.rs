//! Shared test harness for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use warden_approval::{ApprovalGate, RiskClassifier, ToolCatalog};
use warden_audit::{ContentHash, PathLocks, TraceLog, TraceWriter, read_trace};
use warden_core::{Intent, IntentId, SessionId};
use warden_hooks::{
    GovernanceServices, HookPipeline, ToolExecutor, ToolInvocation, ToolOutput,
};
use warden_intent::{IntentCatalog, SessionRegistry, workspace_relative};
use warden_test::{ScriptedApprovalHandler, fixtures};

/// A workspace with the sample intents and a fully governed pipeline.
///
/// Owns a `TempDir` that acts as the workspace root. The tempdir is cleaned
/// up when the harness is dropped.
#[allow(dead_code)]
pub struct GovernedHarness {
    /// The canonical pipeline.
    pub pipeline: HookPipeline,
    /// The session registry the pipeline reads.
    pub registry: SessionRegistry,
    /// The scripted reviewer behind the approval gate.
    pub approvals: ScriptedApprovalHandler,
    /// Where the trace is written.
    pub trace_path: PathBuf,
    dir: TempDir,
}

#[allow(dead_code)]
impl GovernedHarness {
    /// A harness whose reviewer never answers.
    pub fn new() -> Self {
        Self::with_approvals(ScriptedApprovalHandler::new(), Duration::from_secs(5))
    }

    /// A harness with a scripted reviewer and approval timeout.
    pub fn with_approvals(approvals: ScriptedApprovalHandler, timeout: Duration) -> Self {
        let dir = TempDir::new().expect("failed to create tempdir");
        let intents = fixtures::write_sample_intents(dir.path());
        let catalog = IntentCatalog::load(intents);
        Self::assemble(dir, catalog, approvals, timeout)
    }

    /// A harness whose catalog holds exactly `intents`.
    pub fn with_intents(intents: Vec<Intent>) -> Self {
        let dir = TempDir::new().expect("failed to create tempdir");
        Self::assemble(
            dir,
            IntentCatalog::from_intents(intents),
            ScriptedApprovalHandler::new(),
            Duration::from_secs(5),
        )
    }

    fn assemble(
        dir: TempDir,
        catalog: IntentCatalog,
        approvals: ScriptedApprovalHandler,
        timeout: Duration,
    ) -> Self {
        let registry = SessionRegistry::in_memory(Arc::new(catalog));

        let trace_path = dir.path().join(".orchestration/agent_trace.jsonl");
        let trace = TraceWriter::open(&trace_path)
            .expect("failed to open trace")
            .with_revision_capture(false);
        let gate = ApprovalGate::new(Arc::new(approvals.clone())).with_timeout(timeout);

        let pipeline = HookPipeline::governed(GovernanceServices {
            registry: registry.clone(),
            classifier: Arc::new(RiskClassifier::new(ToolCatalog::builtin())),
            gate,
            locks: PathLocks::new(),
            trace: Arc::new(trace),
        });

        Self {
            pipeline,
            registry,
            approvals,
            trace_path,
            dir,
        }
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// A session bound to `intent`.
    pub fn session_with(&self, intent: &str) -> SessionId {
        let session = SessionId::generate();
        self.registry
            .declare_intent(&session, &IntentId::new(intent))
            .expect("failed to declare intent");
        session
    }

    /// A call rooted at the workspace.
    pub fn call(&self, session: &SessionId, tool: &str, args: Map<String, Value>) -> ToolInvocation {
        ToolInvocation::new(session.clone(), tool, args, self.root())
    }

    /// Write a workspace file, creating parents.
    pub fn write_file(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent");
        }
        std::fs::write(path, content).expect("failed to write file");
    }

    /// Read a workspace file, if it exists.
    pub fn read_file(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.root().join(rel)).ok()
    }

    /// The fingerprint a caller would send after reading `rel`.
    pub fn fingerprint(&self, rel: &str) -> String {
        let bytes = std::fs::read(self.root().join(rel)).expect("failed to read file");
        ContentHash::hash(&bytes).to_string()
    }

    /// Wait for background observers, then read the trace.
    pub async fn trace(&self) -> TraceLog {
        self.pipeline.flush().await;
        read_trace(&self.trace_path).expect("failed to read trace")
    }
}

/// `write_to_file` arguments carrying an expected fingerprint.
#[allow(dead_code)]
pub fn guarded_write(path: &str, content: &str, expected: &str) -> Map<String, Value> {
    let mut args = fixtures::write_args(path, content);
    args.insert("expected_hash".to_owned(), json!(expected));
    args
}

/// Executes `write_to_file` against the real filesystem; every other tool
/// succeeds without side effects.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct FsExecutor;

#[async_trait]
impl ToolExecutor for FsExecutor {
    async fn execute(&self, invocation: &ToolInvocation) -> ToolOutput {
        if invocation.tool_name != "write_to_file" {
            return ToolOutput::ok(Value::Null);
        }
        let (Some(path), Some(content)) = (
            invocation.args.get("path").and_then(Value::as_str),
            invocation.args.get("content").and_then(Value::as_str),
        ) else {
            return ToolOutput::failed("missing path or content");
        };
        let Some(target) = workspace_relative(path, invocation.workspace())
            .and_then(|rel| invocation.resolve(&rel))
        else {
            return ToolOutput::failed("path escapes the workspace");
        };
        if let Some(parent) = target.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return ToolOutput::failed(e.to_string());
        }
        match tokio::fs::write(&target, content).await {
            Ok(()) => ToolOutput::ok(json!({ "bytes": content.len() })),
            Err(e) => ToolOutput::failed(e.to_string()),
        }
    }
}
