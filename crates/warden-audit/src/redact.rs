//! Argument sanitization for trace records.
//!
//! Secrets are masked by key name and by content pattern. Large strings (file
//! bodies, patches) are replaced with their length and fingerprint so the
//! trace stays small while still identifying what was written.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::error;

use crate::fingerprint::ContentHash;

/// Replacement for values under a sensitive key.
pub const REDACTED: &str = "[REDACTED]";

/// Default per-string byte limit before a value is summarized.
pub const DEFAULT_MAX_STRING_BYTES: usize = 4096;

const SENSITIVE_KEY_PARTS: &[&str] = &[
    "token",
    "secret",
    "password",
    "passwd",
    "api_key",
    "apikey",
    "authorization",
    "private_key",
    "credential",
];

const PATTERN_SPECS: &[(&str, &str)] = &[
    (
        r"(A3T[A-Z0-9]|AKIA|AGPA|AIDA|AROA|AIPA|ANPA|ANVA|ASIA)[0-9A-Z]{16}",
        "[AWS_KEY_REDACTED]",
    ),
    (
        r#"(?i)aws[^=]*=\s*['"]?[0-9a-zA-Z/+=]{40}['"]?"#,
        "[AWS_SECRET_REDACTED]",
    ),
    (
        r"(ghp|gho|ghu|ghs|ghr)_[a-zA-Z0-9_]{36,255}",
        "[GITHUB_TOKEN_REDACTED]",
    ),
    (r"(?i)bearer\s+[a-zA-Z0-9_\-\.]{20,}", "[BEARER_REDACTED]"),
    (
        r"-----BEGIN (?:RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----[\s\S]*?-----END (?:RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----",
        "[PEM_KEY_REDACTED]",
    ),
    (
        r"-----BEGIN (?:RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----",
        "[PEM_KEY_REDACTED]",
    ),
    (
        r#"(?i)(postgres|postgresql|mysql|mongodb|redis)://[^\s'"]+:[^\s'"]+@[^\s'"]+"#,
        "[CONNECTION_STRING_REDACTED]",
    ),
    (
        r#"(?i)(api[_-]?key|apikey|api_secret|secret[_-]?key)['"]?\s*[:=]\s*['"]?[a-zA-Z0-9_\-]{20,}['"]?"#,
        "[API_KEY_REDACTED]",
    ),
    (
        r#"(?i)(password|passwd|pwd)['"]?\s*[:=]\s*['"]?[^\s'"]{8,}['"]?"#,
        "[PASSWORD_REDACTED]",
    ),
];

static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    PATTERN_SPECS
        .iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(re) => Some((re, *replacement)),
            Err(e) => {
                error!(pattern, error = %e, "Secret pattern failed to compile");
                None
            },
        })
        .collect()
});

/// Mask secrets in a string.
#[must_use]
pub fn redact_string(input: &str) -> String {
    let mut result = input.to_owned();
    for (pattern, replacement) in SECRET_PATTERNS.iter() {
        if pattern.is_match(&result) {
            result = pattern.replace_all(&result, *replacement).into_owned();
        }
    }
    result
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part))
}

/// Turns raw tool arguments into a trace-safe snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redactor {
    mask_secrets: bool,
    max_string_bytes: usize,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(true, DEFAULT_MAX_STRING_BYTES)
    }
}

impl Redactor {
    /// Create a redactor.
    #[must_use]
    pub fn new(mask_secrets: bool, max_string_bytes: usize) -> Self {
        Self {
            mask_secrets,
            max_string_bytes,
        }
    }

    /// Sanitize a whole argument map.
    #[must_use]
    pub fn sanitize_args(&self, args: &Map<String, Value>) -> Value {
        Value::Object(self.sanitize_map(args))
    }

    /// Sanitize any JSON value.
    #[must_use]
    pub fn sanitize(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize_map(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.sanitize(v)).collect()),
            Value::String(s) => Value::String(self.sanitize_string(s)),
            other => other.clone(),
        }
    }

    fn sanitize_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| {
                let clean = if self.mask_secrets && is_sensitive_key(key) {
                    Value::String(REDACTED.to_owned())
                } else {
                    self.sanitize(value)
                };
                (key.clone(), clean)
            })
            .collect()
    }

    fn sanitize_string(&self, s: &str) -> String {
        let text = if self.mask_secrets {
            redact_string(s)
        } else {
            s.to_owned()
        };
        if text.len() > self.max_string_bytes {
            format!(
                "[{} bytes, {}]",
                text.len(),
                ContentHash::hash(text.as_bytes())
            )
        } else {
            text
        }
    }
}
