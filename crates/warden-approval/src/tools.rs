//! Tool catalog and target path extraction.
//!
//! Tools are bucketed by name. Read-only tools never need an intent; mutating
//! tools always do. Command tools are mutating tools whose `command` argument
//! is a shell command that the classifier inspects.

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Built-in tools that never mutate the workspace.
pub const READ_ONLY_TOOLS: &[&str] = &[
    "read_file",
    "list_files",
    "search_files",
    "codebase_search",
    "list_code_definition_names",
    "ask_followup_question",
    "attempt_completion",
    "switch_mode",
    "new_task",
    "update_todo_list",
    "fetch_instructions",
    "access_mcp_resource",
    "select_active_intent",
];

/// Built-in tools that mutate the workspace or run arbitrary code.
pub const MUTATING_TOOLS: &[&str] = &[
    "write_to_file",
    "apply_diff",
    "apply_patch",
    "insert_content",
    "search_and_replace",
    "edit_file",
    "execute_command",
    "use_mcp_tool",
];

/// Built-in tools whose `command` argument is a shell command.
pub const COMMAND_TOOLS: &[&str] = &["execute_command"];

/// Argument keys that name a single target file.
const PATH_KEYS: &[&str] = &["path", "file_path", "target_file", "filename"];

/// Argument keys that carry an `apply_patch` body.
const PATCH_KEYS: &[&str] = &["patch", "input", "diff"];

/// Header prefixes in a patch body that name a touched file.
const PATCH_HEADERS: &[&str] = &[
    "*** Add File:",
    "*** Update File:",
    "*** Delete File:",
    "*** Move to:",
];

/// Coarse classification of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    /// Needs neither intent nor approval.
    Safe,
    /// Needs an active intent and may need approval.
    Destructive,
}

/// Name-based tool buckets, extendable from configuration.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    read_only: HashSet<String>,
    mutating: HashSet<String>,
    command: HashSet<String>,
    approval_patterns: Vec<String>,
    approval_required: GlobSet,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolCatalog {
    /// The built-in buckets.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            read_only: READ_ONLY_TOOLS.iter().map(|s| (*s).to_owned()).collect(),
            mutating: MUTATING_TOOLS.iter().map(|s| (*s).to_owned()).collect(),
            command: COMMAND_TOOLS.iter().map(|s| (*s).to_owned()).collect(),
            approval_patterns: Vec::new(),
            approval_required: GlobSet::empty(),
        }
    }

    /// Mark tools as read-only.
    #[must_use]
    pub fn with_read_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.mutating.remove(&name);
            self.command.remove(&name);
            self.read_only.insert(name);
        }
        self
    }

    /// Mark tools as mutating.
    #[must_use]
    pub fn with_mutating<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.read_only.remove(&name);
            self.mutating.insert(name);
        }
        self
    }

    /// Mark tools as shell-command tools (implies mutating).
    #[must_use]
    pub fn with_command_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.read_only.remove(&name);
            self.mutating.insert(name.clone());
            self.command.insert(name);
        }
        self
    }

    /// Require a human decision for every tool whose name matches `patterns`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub fn with_approval_required<I, S>(mut self, patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approval_patterns
            .extend(patterns.into_iter().map(Into::into));
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.approval_patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.approval_required = builder.build()?;
        Ok(self)
    }

    /// The bucket a tool name falls into, if it is known.
    #[must_use]
    pub fn lookup(&self, tool: &str) -> Option<ToolClass> {
        if self.read_only.contains(tool) {
            Some(ToolClass::Safe)
        } else if self.mutating.contains(tool) {
            Some(ToolClass::Destructive)
        } else {
            None
        }
    }

    /// Whether the tool's `command` argument is a shell command.
    #[must_use]
    pub fn is_command_tool(&self, tool: &str) -> bool {
        self.command.contains(tool)
    }

    /// Whether configuration forces a human decision for this tool.
    #[must_use]
    pub fn requires_approval(&self, tool: &str) -> bool {
        self.approval_required.is_match(tool)
    }
}

/// Files an invocation will touch, as written by the caller, in first-seen order.
///
/// Reads `path`-like keys, a `paths` array, and the file headers of a patch body.
#[must_use]
pub fn target_paths(args: &Map<String, Value>) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut push = |p: &str| {
        let p = p.trim();
        if !p.is_empty() && !paths.iter().any(|seen| seen == p) {
            paths.push(p.to_owned());
        }
    };

    for key in PATH_KEYS {
        if let Some(Value::String(p)) = args.get(*key) {
            push(p);
        }
    }
    if let Some(Value::Array(items)) = args.get("paths") {
        for item in items.iter().filter_map(Value::as_str) {
            push(item);
        }
    }
    for key in PATCH_KEYS {
        if let Some(Value::String(body)) = args.get(*key) {
            for line in body.lines() {
                let line = line.trim_start();
                if let Some(path) = PATCH_HEADERS.iter().find_map(|h| line.strip_prefix(h)) {
                    push(path);
                }
            }
        }
    }
    paths
}
