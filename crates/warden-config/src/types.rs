//! Configuration types.
//!
//! Every section defaults field-by-field so partial files merge cleanly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Intent declaration source.
    pub intents: IntentsSection,
    /// Session registry backend.
    pub registry: RegistrySection,
    /// Audit trace output.
    pub trace: TraceSection,
    /// Human approval gate.
    pub approval: ApprovalSection,
    /// Tool classification overrides.
    pub tools: ToolsSection,
    /// Logging.
    pub logging: LoggingSection,
}

impl Config {
    /// Resolve a configured path against the workspace root.
    #[must_use]
    pub fn resolve(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

/// `[intents]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentsSection {
    /// YAML file listing active intents.
    pub path: PathBuf,
}

impl Default for IntentsSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".orchestration/active_intents.yaml"),
        }
    }
}

/// `[registry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// `memory` or `file`.
    pub backend: String,
    /// Side file used by the `file` backend.
    pub path: PathBuf,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            backend: "file".to_owned(),
            path: PathBuf::from(".orchestration/sessions.json"),
        }
    }
}

/// `[trace]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSection {
    /// JSONL trace file.
    pub path: PathBuf,
    /// Model identifier recorded as the contributor.
    pub model: Option<String>,
    /// Redact secret-looking argument values.
    pub redact: bool,
    /// Longest argument string kept verbatim in a record.
    pub max_arg_bytes: usize,
}

impl Default for TraceSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".orchestration/agent_trace.jsonl"),
            model: None,
            redact: true,
            max_arg_bytes: 4096,
        }
    }
}

/// `[approval]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// `prompt`, `deny` or `approve`.
    pub mode: String,
    /// Seconds to wait for a decision before denying.
    pub timeout_secs: u64,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            mode: "prompt".to_owned(),
            timeout_secs: 300,
        }
    }
}

/// `[tools]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// Extra tools that never need an intent.
    pub read_only: Vec<String>,
    /// Extra tools that always need an intent.
    pub mutating: Vec<String>,
    /// Glob patterns of tool names that always need a human decision.
    pub approval_required: Vec<String>,
    /// Extra tools whose `command` argument is a shell command.
    pub command: Vec<String>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level filter.
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// `stderr`, `stdout` or `file`.
    pub target: String,
    /// Log directory when `target` is `file`.
    pub directory: PathBuf,
    /// `daily`, `hourly` or `never`.
    pub rotation: String,
    /// Per-target overrides such as `warden_hooks=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directory: PathBuf::from(".warden/logs"),
            rotation: "daily".to_owned(),
            directives: Vec::new(),
        }
    }
}
