//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_hooks::prelude::*;` to import all essential types.

pub use crate::{
    GovernanceServices, HookFault, HookPipeline, HookResult, Observer, PipelineFault,
    PostToolEvent, PreStage, PreToolOutcome, ToolExecutor, ToolInvocation, ToolOutput, Validator,
};
