//! Risk classification for tool calls and shell commands.
//!
//! Shell commands are checked against a fixed, ordered set of detectors from
//! most to least severe; the first match decides the tier. Classification is
//! pure and total: every input gets exactly one tier.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;
use warden_core::RiskTier;

use crate::tools::{ToolCatalog, ToolClass};

/// The outcome of classifying a command or tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandClassification {
    /// The command or tool name that was evaluated.
    pub command: String,
    /// Assigned tier.
    pub tier: RiskTier,
    /// Whether a human decision is needed before proceeding.
    pub requires_approval: bool,
    /// Why this tier was chosen.
    pub reason: String,
    /// A safer alternative, when one exists.
    pub mitigation: Option<String>,
}

impl CommandClassification {
    fn safe(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            tier: RiskTier::Safe,
            requires_approval: false,
            reason: reason.into(),
            mitigation: None,
        }
    }
}

struct Detector {
    tier: RiskTier,
    regex: Regex,
    reason: &'static str,
    mitigation: Option<&'static str>,
}

type DetectorSpec = (RiskTier, &'static str, &'static str, Option<&'static str>);

const DETECTOR_SPECS: &[DetectorSpec] = &[
    // critical
    (
        RiskTier::Critical,
        r"\brm\s+(?:-\S+\s+)*(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\s+(?:-\S+\s+)*(?:/\*?|~/?|\*|\$HOME/?|\./?\*?|\.\.)(?:\s|$|[;&|])",
        "recursive deletion of a root, home or wildcard path",
        Some("delete the specific directory inside the workspace instead"),
    ),
    (
        RiskTier::Critical,
        r"\bgit\s+push\b[^;&|]*\s(?:--force(?:-with-lease)?\b|-f\b|--mirror\b|\+\S+)",
        "forced push rewrites shared history",
        Some("push to a new branch and open a pull request"),
    ),
    (
        RiskTier::Critical,
        r"\bgit\s+(?:filter-branch|filter-repo)\b",
        "history rewrite",
        None,
    ),
    (
        RiskTier::Critical,
        r"(?:^|[\s;&|(])(?:sudo|doas|su|pkexec)(?:\s|$)",
        "privilege escalation",
        Some("run the command without elevated privileges"),
    ),
    (
        RiskTier::Critical,
        r"\bdd\b[^;&|]*\bof=/dev/|>\s*/dev/(?:sd|hd|nvme|disk|mmcblk|xvd)|\bmkfs(?:\.\w+)?\b|\b(?:fdisk|parted|wipefs)\b",
        "raw device write or filesystem creation",
        None,
    ),
    (
        RiskTier::Critical,
        r"\|\s*(?:sudo\s+)?(?:ba|z|k|da|fi)?sh\b|\b(?:curl|wget)\b[^;&]*\|\s*(?:python3?|node|perl|ruby)\b",
        "remote content piped into an interpreter",
        Some("download the script, review it, then run it"),
    ),
    (
        RiskTier::Critical,
        r"\b(?:npm|pnpm)\s+(?:install|i|add)\b[^;&|]*\s(?:-g|--global)\b|\byarn\s+global\s+add\b|\bpip3?\s+install\b[^;&|]*--break-system-packages",
        "unscoped global package install",
        Some("install the package as a project dependency"),
    ),
    (
        RiskTier::Critical,
        r#"(?i)\bdrop\s+(?:table|database|schema)\b|\btruncate\s+(?:table\s+)?\w+|\bdelete\s+from\s+[\w."`]+\s*(?:;|$|"|')"#,
        "destructive SQL",
        Some("add a WHERE clause or take a backup first"),
    ),
    (
        RiskTier::Critical,
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        "fork bomb",
        None,
    ),
    (
        RiskTier::Critical,
        r"\bchmod\s+(?:-R\s+)?(?:0?777|a\+rwx)\s+/(?:\s|$)",
        "world-writable root filesystem",
        None,
    ),
    // high
    (
        RiskTier::High,
        r"(?:^|[\s;&|(])rm(?:\s|$)|\b(?:rmdir|unlink|shred)\b|\bfind\b[^;&|]*\s-delete\b",
        "file deletion",
        Some("move files to a scratch directory instead of deleting"),
    ),
    (
        RiskTier::High,
        r"\bgit\s+(?:reset\s+--hard|clean\s+-[a-zA-Z]*f|branch\s+-D|checkout\s+--\s+\.)",
        "discards local work",
        Some("stash changes first"),
    ),
    // medium
    (
        RiskTier::Medium,
        r"\b(?:chmod|chown|chgrp)\b",
        "permission or ownership change",
        None,
    ),
    (
        RiskTier::Medium,
        r"\bcurl\b[^;&|]*(?:\s-[a-zA-Z]*[oO]\b|\s--output\b|\s--remote-name\b|>)|\bwget\b",
        "network download written to disk",
        None,
    ),
    (
        RiskTier::Medium,
        r"\b(?:npm|pnpm)\s+(?:install|i|add)\b|\byarn\s+add\b|\bpip3?\s+install\b|\bcargo\s+(?:add|install)\b|\bgo\s+(?:get|install)\b|\bgem\s+install\b",
        "package install",
        Some("pin the version and check the lockfile diff"),
    ),
];

static DETECTORS: LazyLock<Vec<Detector>> = LazyLock::new(|| {
    DETECTOR_SPECS
        .iter()
        .filter_map(|(tier, pattern, reason, mitigation)| match Regex::new(pattern) {
            Ok(regex) => Some(Detector {
                tier: *tier,
                regex,
                reason: *reason,
                mitigation: *mitigation,
            }),
            Err(e) => {
                error!(pattern, error = %e, "Risk detector failed to compile");
                None
            },
        })
        .collect()
});

/// Classify a shell command.
#[must_use]
pub fn classify_command(text: &str) -> CommandClassification {
    let command = text.trim();
    match DETECTORS.iter().find(|d| d.regex.is_match(command)) {
        Some(detector) => CommandClassification {
            command: command.to_owned(),
            tier: detector.tier,
            requires_approval: detector.tier.requires_approval(),
            reason: detector.reason.to_owned(),
            mitigation: detector.mitigation.map(str::to_owned),
        },
        None => CommandClassification::safe(command, "no risky pattern matched"),
    }
}

/// Whether a command is high or critical risk.
#[must_use]
pub fn is_dangerous_command(text: &str) -> bool {
    classify_command(text).tier.is_dangerous()
}

/// Classifies tool calls using a [`ToolCatalog`] and the command detectors.
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    tools: ToolCatalog,
}

impl RiskClassifier {
    /// Create a classifier over a tool catalog.
    #[must_use]
    pub fn new(tools: ToolCatalog) -> Self {
        Self { tools }
    }

    /// The underlying catalog.
    #[must_use]
    pub fn tools(&self) -> &ToolCatalog {
        &self.tools
    }

    /// Whether a call needs an intent.
    ///
    /// Unknown tools are safe unless their `command` argument trips a detector.
    #[must_use]
    pub fn classify_tool(&self, tool: &str, args: &Map<String, Value>) -> ToolClass {
        if let Some(class) = self.tools.lookup(tool) {
            return class;
        }
        match command_arg(args) {
            Some(command) if classify_command(command).tier > RiskTier::Safe => {
                ToolClass::Destructive
            },
            _ => ToolClass::Safe,
        }
    }

    /// Full risk classification of a call, used to decide on human approval.
    #[must_use]
    pub fn classify_invocation(
        &self,
        tool: &str,
        args: &Map<String, Value>,
    ) -> CommandClassification {
        let mut classification = match (self.tools.lookup(tool), command_arg(args)) {
            (Some(ToolClass::Safe), _) => CommandClassification::safe(tool, "read-only tool"),
            (Some(ToolClass::Destructive), Some(command)) if self.tools.is_command_tool(tool) => {
                classify_command(command)
            },
            (Some(ToolClass::Destructive), _) => {
                CommandClassification::safe(tool, "mutation governed by intent scope")
            },
            (None, Some(command)) => classify_command(command),
            (None, None) => CommandClassification::safe(tool, "unrecognized tool"),
        };

        if self.tools.requires_approval(tool) && !classification.requires_approval {
            classification.tier = classification.tier.max(RiskTier::Medium);
            classification.requires_approval = true;
            classification.reason = format!("{tool} requires approval by configuration");
        }
        classification
    }
}

fn command_arg(args: &Map<String, Value>) -> Option<&str> {
    args.get("command").and_then(Value::as_str)
}
