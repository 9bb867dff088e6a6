//! Bridge from `warden_config::Config` to domain types.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use warden_approval::{ApprovalGate, StaticApprovalHandler, ToolCatalog};
use warden_audit::{Contributor, Redactor};
use warden_config::{ApprovalSection, Config, ToolsSection, TraceSection};
use warden_telemetry::{FileRotation, LogConfig, LogFormat, LogTarget};

use crate::approval_handler::TerminalApprovalHandler;

/// Logging setup for `[logging]`. A relative log directory resolves against
/// the workspace root.
pub(crate) fn to_log_config(config: &Config, root: &Path, verbose: bool) -> LogConfig {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let format = match config.logging.format.as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Compact,
    };
    let mut log_config = LogConfig::new(level).with_format(format);
    for directive in &config.logging.directives {
        log_config = log_config.with_directive(directive.clone());
    }
    match config.logging.target.as_str() {
        "file" => {
            let rotation = match config.logging.rotation.as_str() {
                "hourly" => FileRotation::Hourly,
                "never" => FileRotation::Never,
                _ => FileRotation::Daily,
            };
            let directory = Config::resolve(root, &config.logging.directory);
            log_config.with_file_logging(directory, "warden", rotation)
        },
        "stdout" => {
            let log_config = log_config.with_target(LogTarget::Stdout);
            if std::io::stdout().is_terminal() {
                log_config
            } else {
                log_config.without_ansi()
            }
        },
        _ => {
            if std::io::stderr().is_terminal() {
                log_config
            } else {
                log_config.without_ansi()
            }
        },
    }
}

/// Built-in tool buckets extended by `[tools]`.
pub(crate) fn to_tool_catalog(tools: &ToolsSection) -> anyhow::Result<ToolCatalog> {
    ToolCatalog::builtin()
        .with_read_only(tools.read_only.iter().cloned())
        .with_mutating(tools.mutating.iter().cloned())
        .with_command_tools(tools.command.iter().cloned())
        .with_approval_required(tools.approval_required.iter().cloned())
        .context("invalid tools.approval_required pattern")
}

/// The approval gate for `[approval]`.
pub(crate) fn to_approval_gate(approval: &ApprovalSection) -> ApprovalGate {
    let gate = match approval.mode.as_str() {
        "approve" => ApprovalGate::new(Arc::new(StaticApprovalHandler::approve_all())),
        "deny" => ApprovalGate::new(Arc::new(StaticApprovalHandler::deny_all(
            "approval mode is deny",
        ))),
        _ => ApprovalGate::new(Arc::new(TerminalApprovalHandler::new())),
    };
    gate.with_timeout(Duration::from_secs(approval.timeout_secs))
}

/// Argument sanitization for `[trace]`.
pub(crate) fn to_redactor(trace: &TraceSection) -> Redactor {
    Redactor::new(trace.redact, trace.max_arg_bytes)
}

/// Contributor attribution for `[trace]`.
pub(crate) fn to_contributor(trace: &TraceSection) -> Contributor {
    Contributor::ai(trace.model.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_approval::ToolClass;

    #[test]
    fn test_tool_catalog_overrides() {
        let tools = ToolsSection {
            read_only: vec!["use_mcp_tool".into()],
            mutating: vec!["deploy".into()],
            approval_required: vec!["deploy*".into()],
            command: vec!["run_shell".into()],
        };
        let catalog = to_tool_catalog(&tools).unwrap();
        assert_eq!(catalog.lookup("use_mcp_tool"), Some(ToolClass::Safe));
        assert_eq!(catalog.lookup("deploy"), Some(ToolClass::Destructive));
        assert!(catalog.requires_approval("deploy"));
        assert!(catalog.is_command_tool("run_shell"));
    }

    #[test]
    fn test_verbose_forces_debug() {
        let config = Config::default();
        let root = Path::new("/work/repo");
        assert_eq!(to_log_config(&config, root, true).level, "debug");
        assert_eq!(to_log_config(&config, root, false).level, "info");
        assert_eq!(to_log_config(&config, root, false).target, LogTarget::Stderr);
    }

    #[test]
    fn test_file_target_resolves_directory() {
        let mut config = Config::default();
        config.logging.target = "file".into();
        config.logging.rotation = "hourly".into();
        let log_config = to_log_config(&config, Path::new("/work/repo"), false);
        assert_eq!(
            log_config.target,
            LogTarget::File(std::path::PathBuf::from("/work/repo/.warden/logs"))
        );
        assert_eq!(log_config.file.rotation, FileRotation::Hourly);
        assert_eq!(log_config.file.prefix, "warden");
        assert!(!log_config.ansi);

        config.logging.directory = "/var/log/warden".into();
        assert_eq!(
            to_log_config(&config, Path::new("/work/repo"), false).target,
            LogTarget::File(std::path::PathBuf::from("/var/log/warden"))
        );
    }

    #[test]
    fn test_stdout_target() {
        let mut config = Config::default();
        config.logging.target = "stdout".into();
        assert_eq!(
            to_log_config(&config, Path::new("/work/repo"), false).target,
            LogTarget::Stdout
        );
    }

    #[test]
    fn test_gate_timeout_from_config() {
        let approval = ApprovalSection {
            mode: "deny".into(),
            timeout_secs: 7,
        };
        assert_eq!(to_approval_gate(&approval).timeout(), Duration::from_secs(7));
    }
}
