//! Trace record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use warden_core::{IntentId, SessionId};

use crate::fingerprint::ContentHash;

/// Who produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContributorKind {
    /// An agent.
    Ai,
    /// A person.
    Human,
}

/// Attribution for a trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Kind of contributor.
    pub entity_type: ContributorKind,
    /// Model that produced the change, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_identifier: Option<String>,
}

impl Contributor {
    /// An agent contributor.
    #[must_use]
    pub fn ai(model_identifier: Option<String>) -> Self {
        Self {
            entity_type: ContributorKind::Ai,
            model_identifier,
        }
    }

    /// A human contributor.
    #[must_use]
    pub fn human() -> Self {
        Self {
            entity_type: ContributorKind::Human,
            model_identifier: None,
        }
    }
}

impl Default for Contributor {
    fn default() -> Self {
        Self::ai(None)
    }
}

/// A hashed byte range of one written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeHash {
    /// Workspace-relative path.
    pub path: String,
    /// First byte of the range.
    pub start_byte: u64,
    /// One past the last byte of the range.
    pub end_byte: u64,
    /// Hash of exactly the bytes in the range.
    pub content_hash: ContentHash,
}

/// One line of the audit trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Unique record id.
    pub id: Uuid,
    /// When the tool finished.
    pub timestamp: DateTime<Utc>,
    /// Session that ran the tool.
    pub session_id: SessionId,
    /// Tool name.
    pub tool_name: String,
    /// Sanitized argument snapshot.
    pub args: Value,
    /// Hashed ranges of each written file.
    #[serde(default)]
    pub ranges: Vec<RangeHash>,
    /// Intents the change is attributed to.
    #[serde(default)]
    pub related_intents: Vec<IntentId>,
    /// VCS revision of the workspace, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs_revision: Option<String>,
    /// Who made the change.
    pub contributor: Contributor,
    /// Whether the tool reported success.
    pub success: bool,
    /// Tool wall time in milliseconds.
    pub duration_ms: u64,
}
