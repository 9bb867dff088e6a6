//! Trace commands - read back and verify the audit trail.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use warden_audit::{ContentHash, RangeHash, TraceRecord, read_trace};

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;
use crate::workspace::Workspace;

/// `warden trace show`
pub(crate) fn show_trace(
    workspace: &Workspace,
    session: Option<&str>,
    limit: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let log = read_trace(&workspace.trace_path())?;
    let mut records: Vec<&TraceRecord> = log
        .records
        .iter()
        .filter(|r| session.is_none_or(|s| r.session_id.as_str() == s))
        .collect();
    let skip = records.len().saturating_sub(limit);
    records.drain(..skip);

    if format == OutputFormat::Json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("{}", Theme::info("No trace records"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Trace"));
    for record in records {
        let status = if record.success {
            "ok".green()
        } else {
            "failed".red()
        };
        let intents: Vec<&str> = record.related_intents.iter().map(|i| i.as_str()).collect();
        println!(
            "{} {} {} {} {}",
            Theme::timestamp(&record.timestamp).dimmed(),
            Theme::session_id(record.session_id.as_str()),
            record.tool_name.cyan(),
            status,
            if intents.is_empty() {
                "-".dimmed().to_string()
            } else {
                intents.join(",")
            }
        );
        for range in &record.ranges {
            println!(
                "    {} [{}..{}] {}",
                range.path,
                range.start_byte,
                range.end_byte,
                range.content_hash.to_string().dimmed()
            );
        }
    }
    if log.malformed_lines > 0 {
        println!(
            "\n{}",
            Theme::warning(&format!("{} malformed line(s) skipped", log.malformed_lines))
        );
    }
    println!();
    Ok(())
}

/// State of a recorded range compared with the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RangeState {
    /// The bytes still hash to the recorded value.
    Intact,
    /// The file exists but the bytes differ.
    Modified,
    /// The file is gone or shorter than the range.
    Missing,
}

#[derive(Debug, Serialize)]
struct RangeCheck<'a> {
    path: &'a str,
    start_byte: u64,
    end_byte: u64,
    state: RangeState,
}

#[derive(Debug, Default, Serialize)]
struct CheckSummary {
    intact: usize,
    modified: usize,
    missing: usize,
    malformed_lines: usize,
}

/// Compare a recorded range against the current file contents.
pub(crate) fn check_range(root: &Path, range: &RangeHash) -> RangeState {
    let Ok(bytes) = std::fs::read(root.join(&range.path)) else {
        return RangeState::Missing;
    };
    let (Ok(start), Ok(end)) = (
        usize::try_from(range.start_byte),
        usize::try_from(range.end_byte),
    ) else {
        return RangeState::Missing;
    };
    match bytes.get(start..end) {
        Some(slice) if ContentHash::hash(slice) == range.content_hash => RangeState::Intact,
        Some(_) => RangeState::Modified,
        None => RangeState::Missing,
    }
}

/// `warden trace check`
pub(crate) fn check_trace(workspace: &Workspace, format: OutputFormat) -> anyhow::Result<bool> {
    let log = read_trace(&workspace.trace_path())?;
    let mut summary = CheckSummary {
        malformed_lines: log.malformed_lines,
        ..CheckSummary::default()
    };
    let mut checks = Vec::new();
    for range in log.records.iter().flat_map(|r| &r.ranges) {
        let state = check_range(&workspace.root, range);
        match state {
            RangeState::Intact => summary.intact = summary.intact.saturating_add(1),
            RangeState::Modified => summary.modified = summary.modified.saturating_add(1),
            RangeState::Missing => summary.missing = summary.missing.saturating_add(1),
        }
        checks.push(RangeCheck {
            path: &range.path,
            start_byte: range.start_byte,
            end_byte: range.end_byte,
            state,
        });
    }
    let clean = summary.modified == 0 && summary.missing == 0 && summary.malformed_lines == 0;

    if format == OutputFormat::Json {
        print_json(&serde_json::json!({ "ranges": checks, "summary": summary }))?;
        return Ok(clean);
    }

    for check in checks.iter().filter(|c| c.state != RangeState::Intact) {
        let label = match check.state {
            RangeState::Modified => "modified".yellow().to_string(),
            _ => Theme::error("missing"),
        };
        println!(
            "{label} {} [{}..{}]",
            check.path, check.start_byte, check.end_byte
        );
    }
    let line = format!(
        "{} intact, {} modified, {} missing, {} malformed line(s)",
        summary.intact, summary.modified, summary.missing, summary.malformed_lines
    );
    if clean {
        println!("{}", Theme::success(&line));
    } else {
        println!("{}", Theme::warning(&line));
    }
    Ok(clean)
}
