//! Workspace revision lookup.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

/// The `HEAD` commit of the git repository containing `cwd`, if any.
#[must_use]
pub fn current_revision(cwd: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| debug!(error = %e, "git unavailable"))
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    let revision = revision.trim();
    (!revision.is_empty()).then(|| revision.to_owned())
}
