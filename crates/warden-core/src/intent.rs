//! The intent model.
//!
//! An intent is a declared unit of work: it names what the agent is doing and
//! which files it may touch while doing it. Intents come from an external
//! declaration file and are read-only to Warden.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::IntentId;

/// Lifecycle status of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    /// Declared but not started
    #[serde(alias = "PENDING", alias = "TODO")]
    Pending,
    /// Work in progress
    #[serde(alias = "ACTIVE", alias = "IN_PROGRESS", alias = "in_progress")]
    Active,
    /// Waiting on something outside the agent
    #[serde(alias = "BLOCKED")]
    Blocked,
    /// Finished
    #[serde(alias = "COMPLETED", alias = "DONE", alias = "done")]
    Completed,
}

impl IntentStatus {
    /// Whether a session may bind to an intent in this status.
    #[must_use]
    pub fn is_assignable(self) -> bool {
        matches!(self, Self::Active | Self::Pending)
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Blocked => write!(f, "blocked"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// A declared unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Unique identifier
    pub id: IntentId,
    /// Display name
    pub name: String,
    /// Lifecycle status
    pub status: IntentStatus,
    /// Ownership glob patterns, ORed
    #[serde(default)]
    pub owned_scope: Vec<String>,
    /// Constraints the agent must respect
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Conditions for calling the work done
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Free-text background
    #[serde(default)]
    pub context: String,
    /// Files worth reading before starting
    #[serde(default)]
    pub related_files: Vec<String>,
    /// Extension metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Intent {
    /// Create an active intent with no scope.
    #[must_use]
    pub fn new(id: impl Into<IntentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: IntentStatus::Active,
            owned_scope: Vec::new(),
            constraints: Vec::new(),
            acceptance_criteria: Vec::new(),
            context: String::new(),
            related_files: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the lifecycle status.
    #[must_use]
    pub fn with_status(mut self, status: IntentStatus) -> Self {
        self.status = status;
        self
    }

    /// Add an ownership pattern.
    #[must_use]
    pub fn with_scope(mut self, pattern: impl Into<String>) -> Self {
        self.owned_scope.push(pattern.into());
        self
    }

    /// Add a constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Set the free-text context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Whether a session may bind to this intent.
    #[must_use]
    pub fn is_assignable(&self) -> bool {
        self.status.is_assignable()
    }

    /// Render the block handed back to the agent when it selects this intent.
    #[must_use]
    pub fn context_block(&self) -> String {
        let mut out = format!(
            "<intent_context id=\"{}\">\nname: {}\nstatus: {}\n",
            self.id, self.name, self.status
        );
        push_list(&mut out, "owned_scope", &self.owned_scope);
        push_list(&mut out, "constraints", &self.constraints);
        push_list(&mut out, "acceptance_criteria", &self.acceptance_criteria);
        push_list(&mut out, "related_files", &self.related_files);
        if !self.context.trim().is_empty() {
            out.push_str("context: ");
            out.push_str(self.context.trim());
            out.push('\n');
        }
        out.push_str("</intent_context>");
        out
    }
}

fn push_list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(label);
    out.push_str(":\n");
    for item in items {
        out.push_str("  - ");
        out.push_str(item);
        out.push('\n');
    }
}
