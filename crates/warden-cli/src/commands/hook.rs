//! Hook boundary: `warden hook pre|post`.
//!
//! The host pipes one JSON object per call on stdin and reads a hook result
//! from stdout. A denied pre-hook exits with status 2.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tracing::debug;
use warden_core::SessionId;
use warden_hooks::{PostToolEvent, ToolInvocation};

use crate::workspace::Workspace;

/// Exit status for a denied call.
pub(crate) const DENIED_EXIT_CODE: u8 = 2;

/// A tool call as the host describes it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HookCall {
    #[serde(alias = "sessionId")]
    pub(crate) session_id: String,
    #[serde(alias = "tool", alias = "toolName")]
    pub(crate) tool_name: String,
    #[serde(default, alias = "tool_input", alias = "arguments", alias = "params")]
    pub(crate) args: Map<String, Value>,
    #[serde(default)]
    pub(crate) cwd: Option<PathBuf>,
}

impl HookCall {
    fn into_invocation(self, root: &Path) -> ToolInvocation {
        let cwd = self.cwd.map_or_else(|| root.to_path_buf(), |c| root.join(c));
        ToolInvocation::new(SessionId::new(self.session_id), self.tool_name, self.args, cwd)
    }
}

/// A finished tool call as the host describes it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PostHookCall {
    #[serde(flatten)]
    pub(crate) call: HookCall,
    #[serde(default = "default_success")]
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) duration_ms: u64,
    #[serde(default, alias = "result")]
    pub(crate) output: Option<Value>,
}

fn default_success() -> bool {
    true
}

async fn read_stdin() -> anyhow::Result<String> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("failed to read hook input from stdin")?;
    Ok(raw)
}

pub(crate) fn parse_pre(raw: &str) -> anyhow::Result<HookCall> {
    serde_json::from_str(raw).context("hook input is not a valid tool call")
}

pub(crate) fn parse_post(raw: &str) -> anyhow::Result<PostHookCall> {
    serde_json::from_str(raw).context("hook input is not a valid finished tool call")
}

/// `warden hook pre`
pub(crate) async fn run_pre(workspace: &Workspace) -> anyhow::Result<ExitCode> {
    let call = parse_pre(&read_stdin().await?)?;
    let pipeline = workspace.pipeline()?;
    let outcome = pipeline
        .pre_tool_use(call.into_invocation(&workspace.root))
        .await;

    println!("{}", serde_json::to_string(&outcome.result)?);
    if outcome.is_allowed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(DENIED_EXIT_CODE))
    }
}

/// `warden hook post`
pub(crate) async fn run_post(workspace: &Workspace) -> anyhow::Result<ExitCode> {
    let post = parse_post(&read_stdin().await?)?;
    let pipeline = workspace.pipeline()?;
    let invocation = post.call.into_invocation(&workspace.root);
    let intent = workspace.registry.active_intent(&invocation.session_id);
    debug!(
        session_id = %invocation.session_id,
        intent_id = ?intent.as_ref().map(|i| i.id.as_str()),
        "Recording finished call"
    );

    let mut event = PostToolEvent::new(
        invocation,
        post.success,
        Duration::from_millis(post.duration_ms),
    )
    .with_intent(intent);
    event.output = post.output;

    let result = pipeline.post_tool_use(event);
    // One-shot process: wait for the trace before exiting.
    pipeline.flush().await;
    println!("{}", serde_json::to_string(&result)?);
    Ok(ExitCode::SUCCESS)
}
