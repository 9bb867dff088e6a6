//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Longest approval wait accepted (one day).
const MAX_APPROVAL_TIMEOUT_SECS: u64 = 86_400;

/// Smallest per-argument budget that still leaves a readable prefix.
const MIN_ARG_BYTES: usize = 64;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_paths(config)?;
    validate_registry(config)?;
    validate_trace(config)?;
    validate_approval(config)?;
    validate_tools(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!(
                "unsupported value '{value}'; expected one of: {}",
                allowed.join(", ")
            ),
        ))
    }
}

fn validate_paths(config: &Config) -> ConfigResult<()> {
    for (field, path) in [
        ("intents.path", &config.intents.path),
        ("registry.path", &config.registry.path),
        ("trace.path", &config.trace.path),
    ] {
        if path.as_os_str().is_empty() {
            return Err(invalid(field, "path must not be empty"));
        }
    }
    Ok(())
}

fn validate_registry(config: &Config) -> ConfigResult<()> {
    one_of("registry.backend", &config.registry.backend, &["memory", "file"])
}

fn validate_trace(config: &Config) -> ConfigResult<()> {
    if config.trace.max_arg_bytes < MIN_ARG_BYTES {
        return Err(invalid(
            "trace.max_arg_bytes",
            format!("must be at least {MIN_ARG_BYTES}"),
        ));
    }
    if config
        .trace
        .model
        .as_deref()
        .is_some_and(|m| m.trim().is_empty())
    {
        return Err(invalid("trace.model", "must not be blank when set"));
    }
    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    one_of(
        "approval.mode",
        &config.approval.mode,
        &["prompt", "deny", "approve"],
    )?;
    let secs = config.approval.timeout_secs;
    if secs == 0 || secs > MAX_APPROVAL_TIMEOUT_SECS {
        return Err(invalid(
            "approval.timeout_secs",
            format!("must be between 1 and {MAX_APPROVAL_TIMEOUT_SECS}"),
        ));
    }
    Ok(())
}

fn validate_tools(config: &Config) -> ConfigResult<()> {
    let tools = &config.tools;
    for name in tools.read_only.iter().chain(&tools.mutating).chain(&tools.command) {
        if name.trim().is_empty() {
            return Err(invalid("tools", "tool names must not be blank"));
        }
    }
    if let Some(name) = tools.read_only.iter().find(|n| tools.mutating.contains(*n)) {
        return Err(invalid(
            "tools.read_only",
            format!("'{name}' is also listed under tools.mutating"),
        ));
    }
    for pattern in &tools.approval_required {
        globset::Glob::new(pattern).map_err(|e| {
            invalid(
                "tools.approval_required",
                format!("bad pattern '{pattern}': {e}"),
            )
        })?;
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    one_of(
        "logging.level",
        &config.logging.level,
        &["trace", "debug", "info", "warn", "error"],
    )?;
    one_of(
        "logging.format",
        &config.logging.format,
        &["pretty", "compact", "json", "full"],
    )?;
    one_of(
        "logging.target",
        &config.logging.target,
        &["stderr", "stdout", "file"],
    )?;
    one_of(
        "logging.rotation",
        &config.logging.rotation,
        &["daily", "hourly", "never"],
    )?;
    if config.logging.target == "file" && config.logging.directory.as_os_str().is_empty() {
        return Err(invalid(
            "logging.directory",
            "must be set when logging.target is file",
        ));
    }
    Ok(())
}
