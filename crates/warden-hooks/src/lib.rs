//! Warden Hooks - the pre/post tool-use pipeline.
//!
//! Every tool call an agent makes passes through a [`HookPipeline`]:
//!
//! 1. **Pre-stage**: ordered [`Validator`]s decide whether the call may run.
//!    The canonical chain checks intent selection, that an intent is
//!    declared, that the call agrees with it, that target paths are in
//!    scope, that risky calls are approved, and that target files have not
//!    changed since the caller read them. The first denial wins.
//! 2. **Execution**: done by the host, optionally through a [`ToolExecutor`].
//! 3. **Post-stage**: [`Observer`]s (the audit trace) run in the background.
//!
//! Hook faults never reach the caller. They are logged and published on the
//! channel returned by [`HookPipeline::subscribe_faults`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod executor;
mod fault;
mod observer;
mod pipeline;
mod result;
mod validator;
pub mod validators;

pub use context::{
    CLAIMED_INTENT_KEY, EXPECTED_FINGERPRINT_KEYS, PostToolEvent, ToolInvocation,
};
pub use executor::{ToolExecutor, ToolOutcome, ToolOutput};
pub use fault::{FAULT_CHANNEL_CAPACITY, HookStage, PipelineFault};
pub use observer::{Observer, TraceObserver};
pub use pipeline::{GovernanceServices, HookPipeline, HookPipelineBuilder, PreToolOutcome};
pub use result::HookResult;
pub use validator::{HookFault, PreStage, Validator};
