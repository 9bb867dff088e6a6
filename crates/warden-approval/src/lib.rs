//! Warden Approval - Risk classification and the human approval gate.
//!
//! - [`ToolCatalog`] buckets tools into read-only and mutating
//! - [`RiskClassifier`], [`classify_command`] and [`is_dangerous_command`]
//!   assign risk tiers to tool calls and shell commands
//! - [`ApprovalGate`] suspends risky calls until an [`ApprovalHandler`]
//!   decides or the timeout expires

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod classifier;
pub mod gate;
pub mod tools;

pub use classifier::{CommandClassification, RiskClassifier, classify_command, is_dangerous_command};
pub use gate::{
    ApprovalDecision, ApprovalGate, ApprovalHandler, ApprovalRequest, ChannelApprovalHandler,
    DEFAULT_TIMEOUT, GateOutcome, PendingApproval, StaticApprovalHandler,
};
pub use tools::{ToolCatalog, ToolClass, target_paths};
