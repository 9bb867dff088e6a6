//! Ownership scope matching.
//!
//! An intent owns a list of glob-like patterns. A path is in scope when it
//! matches at least one of them after normalization:
//!
//! - `**` matches any sequence, separators included (`a/**/b` also matches `a/b`)
//! - `*` matches any sequence without a separator
//! - `?` matches exactly one character
//! - a trailing `/` means everything below that directory
//!
//! Matching is anchored to the whole path. An empty pattern list owns nothing.

use std::path::Path;

use regex::Regex;
use tracing::warn;

/// A compiled set of ownership patterns.
#[derive(Debug, Clone, Default)]
pub struct ScopeMatcher {
    patterns: Vec<ScopePattern>,
}

#[derive(Debug, Clone)]
struct ScopePattern {
    source: String,
    regex: Regex,
}

impl ScopeMatcher {
    /// Compile a pattern list. Blank patterns are ignored.
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.trim().is_empty())
            .filter_map(|source| match Regex::new(&translate(source)) {
                Ok(regex) => Some(ScopePattern {
                    source: source.to_owned(),
                    regex,
                }),
                Err(e) => {
                    warn!(pattern = source, error = %e, "Ignoring uncompilable scope pattern");
                    None
                },
            })
            .collect();
        Self { patterns }
    }

    /// Whether `path` is owned by any pattern.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }

    /// The first pattern that owns `path`, if any.
    #[must_use]
    pub fn first_match(&self, path: &str) -> Option<&str> {
        let normalized = normalize_path(path)?;
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(&normalized))
            .map(|p| p.source.as_str())
    }

    /// Whether the matcher owns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Whether `path` falls inside `owned_patterns`.
#[must_use]
pub fn is_in_scope<S: AsRef<str>>(path: &str, owned_patterns: &[S]) -> bool {
    ScopeMatcher::new(owned_patterns).is_match(path)
}

/// Normalize a path for matching.
///
/// Separators become `/`, leading `./` and `/` are dropped, `.` segments
/// vanish and `..` pops the previous segment. Returns `None` for an empty
/// path or one whose `..` climbs above the root.
#[must_use]
pub fn normalize_path(path: &str) -> Option<String> {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                parts.pop()?;
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Express a tool path relative to the workspace root `cwd`.
///
/// Relative paths come back unchanged for [`normalize_path`] to handle.
/// Absolute paths under `cwd` lose the prefix. Returns `None` for an
/// absolute path outside the workspace.
#[must_use]
pub fn workspace_relative(path: &str, cwd: &Path) -> Option<String> {
    let candidate = Path::new(path);
    if !candidate.is_absolute() {
        return Some(path.to_owned());
    }
    candidate
        .strip_prefix(cwd)
        .ok()
        .map(|rel| rel.to_string_lossy().into_owned())
}

fn translate(pattern: &str) -> String {
    let mut source = pattern.replace('\\', "/");
    while let Some(rest) = source.strip_prefix("./") {
        source = rest.to_owned();
    }
    let mut source = source.trim_start_matches('/').to_owned();
    if source.ends_with('/') {
        source.push_str("**");
    }

    let mut out = String::from("^");
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            },
            '*' => out.push_str("[^/]*"),
            '?' => out.push('.'),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            },
        }
    }
    out.push('$');
    out
}
