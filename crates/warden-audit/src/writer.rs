//! Append-only JSONL trace writer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::{IntentId, SessionId};

use crate::error::{AuditError, AuditResult};
use crate::fingerprint::ContentHash;
use crate::record::{Contributor, RangeHash, TraceRecord};
use crate::redact::Redactor;
use crate::vcs;

/// Argument keys whose value is the text a tool wrote.
const CONTENT_KEYS: &[&str] = &["content", "new_content", "replacement", "text"];

/// Everything needed to describe one completed mutation.
#[derive(Debug, Clone)]
pub struct TraceInput {
    /// Session that ran the tool.
    pub session_id: SessionId,
    /// Tool name.
    pub tool_name: String,
    /// Raw arguments.
    pub args: Map<String, Value>,
    /// Workspace root the paths are relative to.
    pub cwd: PathBuf,
    /// Workspace-relative paths the tool wrote.
    pub written_paths: Vec<String>,
    /// Intents the change is attributed to.
    pub related_intents: Vec<IntentId>,
    /// Whether the tool reported success.
    pub success: bool,
    /// Tool wall time.
    pub duration: Duration,
}

/// Serializes trace records to a JSONL file, one `write` per record.
#[derive(Debug)]
pub struct TraceWriter {
    path: PathBuf,
    file: Mutex<File>,
    contributor: Contributor,
    redactor: Redactor,
    capture_revision: bool,
}

impl TraceWriter {
    /// Open (or create) the trace file for appending.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file or its parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "Opened trace file");
        Ok(Self {
            path,
            file: Mutex::new(file),
            contributor: Contributor::default(),
            redactor: Redactor::default(),
            capture_revision: true,
        })
    }

    /// Attribute records to `contributor`.
    #[must_use]
    pub fn with_contributor(mut self, contributor: Contributor) -> Self {
        self.contributor = contributor;
        self
    }

    /// Sanitize arguments with `redactor`.
    #[must_use]
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    /// Whether to look up the workspace's VCS revision for each record.
    #[must_use]
    pub fn with_revision_capture(mut self, enabled: bool) -> Self {
        self.capture_revision = enabled;
        self
    }

    /// The trace file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a record from the workspace as it is now.
    ///
    /// Each written path contributes one range: the first occurrence of the
    /// written content if it can be found, otherwise the whole file. Paths
    /// that no longer exist contribute nothing.
    #[must_use]
    pub fn build_record(&self, input: &TraceInput) -> TraceRecord {
        let written = written_content(&input.args);
        let ranges = input
            .written_paths
            .iter()
            .filter_map(|rel| range_for(&input.cwd, rel, written))
            .collect();

        TraceRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session_id: input.session_id.clone(),
            tool_name: input.tool_name.clone(),
            args: self.redactor.sanitize_args(&input.args),
            ranges,
            related_intents: input.related_intents.clone(),
            vcs_revision: self
                .capture_revision
                .then(|| vcs::current_revision(&input.cwd))
                .flatten(),
            contributor: self.contributor.clone(),
            success: input.success,
            duration_ms: u64::try_from(input.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Append a record as one line.
    ///
    /// # Errors
    ///
    /// Returns a serialization or IO error.
    pub fn append(&self, record: &TraceRecord) -> AuditResult<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| AuditError::SerializationError(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().unwrap_or_else(|e| {
            warn!("Trace file lock was poisoned, recovering");
            e.into_inner()
        });
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Build and append a record.
    ///
    /// # Errors
    ///
    /// Returns a serialization or IO error.
    pub fn record(&self, input: &TraceInput) -> AuditResult<TraceRecord> {
        let record = self.build_record(input);
        self.append(&record)?;
        debug!(
            record_id = %record.id,
            tool = %record.tool_name,
            ranges = record.ranges.len(),
            "Trace record appended"
        );
        Ok(record)
    }
}

fn written_content(args: &Map<String, Value>) -> Option<&str> {
    CONTENT_KEYS
        .iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn range_for(cwd: &Path, rel: &str, written: Option<&str>) -> Option<RangeHash> {
    let bytes = match std::fs::read(cwd.join(rel)) {
        Ok(b) => b,
        Err(e) => {
            debug!(path = rel, error = %e, "Written path unreadable; no range recorded");
            return None;
        },
    };

    let occurrence = written.and_then(|needle| {
        let needle = needle.as_bytes();
        bytes
            .windows(needle.len())
            .enumerate()
            .find(|(_, window)| *window == needle)
    });

    let (start, slice) = occurrence.unwrap_or((0, bytes.as_slice()));
    let start = u64::try_from(start).unwrap_or(u64::MAX);
    let len = u64::try_from(slice.len()).unwrap_or(u64::MAX);
    Some(RangeHash {
        path: rel.to_owned(),
        start_byte: start,
        end_byte: start.saturating_add(len),
        content_hash: ContentHash::hash(slice),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_trace;
    use serde_json::json;

    fn input(cwd: &Path, args: Value, paths: &[&str]) -> TraceInput {
        TraceInput {
            session_id: SessionId::new("s1"),
            tool_name: "write_to_file".into(),
            args: args.as_object().cloned().unwrap(),
            cwd: cwd.to_path_buf(),
            written_paths: paths.iter().map(|p| (*p).to_owned()).collect(),
            related_intents: vec![IntentId::new("INT-001")],
            success: true,
            duration: Duration::from_millis(12),
        }
    }

    fn writer(dir: &Path) -> TraceWriter {
        TraceWriter::open(dir.join(".orchestration/agent_trace.jsonl"))
            .unwrap()
            .with_revision_capture(false)
    }

    #[test]
    fn test_whole_file_range_when_content_is_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export const a = 1;\n").unwrap();
        let writer = writer(dir.path());
        let record = writer.build_record(&input(
            dir.path(),
            json!({ "path": "a.ts", "content": "export const a = 1;\n" }),
            &["a.ts"],
        ));
        assert_eq!(record.ranges.len(), 1);
        let range = &record.ranges[0];
        assert_eq!((range.start_byte, range.end_byte), (0, 20));
        assert_eq!(
            range.content_hash,
            ContentHash::hash(b"export const a = 1;\n")
        );
        assert_eq!(record.duration_ms, 12);
    }

    #[test]
    fn test_range_locates_inserted_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "head\nINSERTED\ntail\n").unwrap();
        let record = writer(dir.path()).build_record(&input(
            dir.path(),
            json!({ "path": "a.ts", "content": "INSERTED" }),
            &["a.ts"],
        ));
        let range = &record.ranges[0];
        assert_eq!((range.start_byte, range.end_byte), (5, 13));
        assert_eq!(range.content_hash, ContentHash::hash(b"INSERTED"));
    }

    #[test]
    fn test_falls_back_to_whole_file_when_content_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "formatted output").unwrap();
        let record = writer(dir.path()).build_record(&input(
            dir.path(),
            json!({ "path": "a.ts", "content": "unformatted" }),
            &["a.ts"],
        ));
        let range = &record.ranges[0];
        assert_eq!((range.start_byte, range.end_byte), (0, 16));
        assert_eq!(range.content_hash, ContentHash::hash(b"formatted output"));
    }

    #[test]
    fn test_missing_file_has_no_range() {
        let dir = tempfile::tempdir().unwrap();
        let record = writer(dir.path()).build_record(&input(
            dir.path(),
            json!({ "path": "deleted.ts" }),
            &["deleted.ts"],
        ));
        assert!(record.ranges.is_empty());
    }

    #[test]
    fn test_args_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "x").unwrap();
        let record = writer(dir.path()).build_record(&input(
            dir.path(),
            json!({ "path": "a.ts", "content": "x", "api_token": "abc" }),
            &["a.ts"],
        ));
        assert_eq!(record.args["api_token"], crate::redact::REDACTED);
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "x").unwrap();
        let writer = writer(dir.path());
        let inp = input(dir.path(), json!({ "path": "a.ts" }), &["a.ts"]);
        let first = writer.record(&inp).unwrap();
        writer.record(&inp).unwrap();

        let log = read_trace(writer.path()).unwrap();
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.malformed_lines, 0);
        assert_eq!(log.records[0].id, first.id);
        assert_eq!(log.records[0].related_intents, vec![IntentId::new("INT-001")]);
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "x".repeat(2048)).unwrap();
        let writer = std::sync::Arc::new(writer(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let writer = writer.clone();
                let inp = input(dir.path(), json!({ "path": "a.ts" }), &["a.ts"]);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        writer.record(&inp).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let log = read_trace(writer.path()).unwrap();
        assert_eq!(log.records.len(), 80);
        assert_eq!(log.malformed_lines, 0);
    }
}
