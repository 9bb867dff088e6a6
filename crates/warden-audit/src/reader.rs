//! Trace file reader.

use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::error::AuditResult;
use crate::record::TraceRecord;

/// Parsed contents of a trace file.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    /// Records in file order.
    pub records: Vec<TraceRecord>,
    /// Lines that were not valid records.
    pub malformed_lines: usize,
}

/// Read every record in a trace file. A missing file reads as empty.
///
/// Blank lines are skipped; lines that do not parse are counted, not fatal.
///
/// # Errors
///
/// Returns an IO error if the file exists but cannot be read.
pub fn read_trace(path: &Path) -> AuditResult<TraceLog> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TraceLog::default()),
        Err(e) => return Err(e.into()),
    };

    let mut log = TraceLog::default();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceRecord>(&line) {
            Ok(record) => log.records.push(record),
            Err(e) => {
                warn!(line = index.saturating_add(1), error = %e, "Malformed trace line");
                log.malformed_lines = log.malformed_lines.saturating_add(1);
            },
        }
    }
    Ok(log)
}
