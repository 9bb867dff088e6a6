//! Host-side tool execution seam.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ToolInvocation;

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether the tool succeeded.
    pub success: bool,
    /// Tool output as the host reports it.
    #[serde(default)]
    pub output: Value,
}

impl ToolOutput {
    /// A successful result.
    #[must_use]
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::String(message.into()),
        }
    }
}

/// Runs tools on behalf of the pipeline.
///
/// The pipeline never executes tools itself; hosts implement this to let
/// [`HookPipeline::invoke`](crate::HookPipeline::invoke) drive a whole call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute the call with its effective arguments.
    async fn execute(&self, invocation: &ToolInvocation) -> ToolOutput;
}

/// A call that passed the pre-stage and ran.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// The tool's result.
    pub output: ToolOutput,
    /// Tool wall time.
    pub duration: Duration,
    /// Context the pre-stage surfaced for the caller.
    pub context: Option<String>,
}
