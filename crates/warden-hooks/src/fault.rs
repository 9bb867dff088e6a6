//! Fault reporting.

use std::any::Any;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::error;
use uuid::Uuid;

/// Capacity of the fault channel. Slow subscribers miss older faults.
pub const FAULT_CHANNEL_CAPACITY: usize = 64;

/// Which half of the pipeline faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStage {
    /// Before execution.
    Pre,
    /// After execution.
    Post,
}

/// A hook that errored or panicked.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineFault {
    /// Stage the hook belongs to.
    pub stage: HookStage,
    /// Hook name.
    pub hook: String,
    /// Call being processed.
    pub invocation_id: Uuid,
    /// What went wrong.
    pub message: String,
}

pub(crate) fn report(
    faults: &broadcast::Sender<PipelineFault>,
    stage: HookStage,
    hook: &str,
    invocation_id: Uuid,
    message: String,
) {
    error!(
        stage = ?stage,
        hook,
        invocation_id = %invocation_id,
        error = %message,
        "Hook faulted; continuing"
    );
    // No subscribers is fine.
    let _ = faults.send(PipelineFault {
        stage,
        hook: hook.to_owned(),
        invocation_id,
        message,
    });
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}
