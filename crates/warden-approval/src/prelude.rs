//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_approval::prelude::*;` to import all essential types.

pub use crate::{
    ApprovalDecision, ApprovalGate, ApprovalHandler, ApprovalRequest, CommandClassification,
    GateOutcome, RiskClassifier, ToolCatalog, ToolClass, classify_command, is_dangerous_command,
};
