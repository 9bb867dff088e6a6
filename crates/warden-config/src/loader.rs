//! Config file discovery and layered loading.
//!
//! Implements the `load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.warden/config.toml` (user)
//! 3. Merge `{workspace}/.warden/config.toml` (workspace)
//! 4. Apply `WARDEN_*` environment overrides
//! 5. Deserialize merged tree → `Config`
//! 6. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Environment variables mapped onto `(section, key)`.
const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("WARDEN_INTENTS_PATH", "intents", "path"),
    ("WARDEN_REGISTRY_BACKEND", "registry", "backend"),
    ("WARDEN_REGISTRY_PATH", "registry", "path"),
    ("WARDEN_TRACE_PATH", "trace", "path"),
    ("WARDEN_MODEL", "trace", "model"),
    ("WARDEN_APPROVAL_MODE", "approval", "mode"),
    ("WARDEN_APPROVAL_TIMEOUT_SECS", "approval", "timeout_secs"),
    ("WARDEN_LOG_LEVEL", "logging", "level"),
    ("WARDEN_LOG_FORMAT", "logging", "format"),
    ("WARDEN_LOG_TARGET", "logging", "target"),
    ("WARDEN_LOG_DIR", "logging", "directory"),
];

/// A merged configuration and the files that contributed to it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The validated configuration.
    pub config: Config,
    /// Files merged on top of the defaults, in order.
    pub loaded_files: Vec<PathBuf>,
}

/// Load configuration with layered file precedence and process environment.
///
/// `workspace_root` is the project root; if `None` the workspace layer is
/// skipped. `warden_home_override` replaces `~/.warden` for user-level
/// discovery.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    warden_home_override: Option<&Path>,
) -> ConfigResult<LoadedConfig> {
    let env: HashMap<String, String> = std::env::vars()
        .filter(|(k, _)| k.starts_with("WARDEN_"))
        .collect();
    load_with_env(workspace_root, warden_home_override, &env)
}

/// Same as [`load`] with an explicit environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any layer is malformed or validation fails.
pub fn load_with_env(
    workspace_root: Option<&Path>,
    warden_home_override: Option<&Path>,
    env: &HashMap<String, String>,
) -> ConfigResult<LoadedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    let warden_home = match warden_home_override {
        Some(h) => h.to_path_buf(),
        None => home_directory()?.join(".warden"),
    };
    let user_path = warden_home.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, overlay);
        info!(path = %user_path.display(), "loaded user config");
        loaded_files.push(user_path);
    }

    if let Some(root) = workspace_root {
        let ws_path = root.join(".warden").join("config.toml");
        if let Some(overlay) = try_load_file(&ws_path)? {
            deep_merge(&mut merged, overlay);
            info!(path = %ws_path.display(), "loaded workspace config");
            loaded_files.push(ws_path);
        }
    }

    let applied = apply_env_overrides(&mut merged, env)?;
    if applied > 0 {
        debug!(count = applied, "applied environment overrides");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(LoadedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is missing, unreadable, malformed,
/// or invalid.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let Some(overlay) = try_load_file(path)? else {
        return Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    };
    let config: Config = overlay
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Merge `overlay` into `base`; tables merge key by key, anything else replaces.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_table.insert(key, value);
                    },
                }
            }
        },
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(
    merged: &mut toml::Value,
    env: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let Some(root) = merged.as_table_mut() else {
        return Ok(0);
    };

    let mut applied = 0usize;
    for (var, section, key) in ENV_OVERRIDES {
        let Some(raw) = env.get(*var) else {
            continue;
        };
        let value = if *key == "timeout_secs" {
            let secs = raw
                .trim()
                .parse::<i64>()
                .map_err(|e| ConfigError::ValidationError {
                    field: (*var).to_owned(),
                    message: format!("expected an integer: {e}"),
                })?;
            toml::Value::Integer(secs)
        } else {
            toml::Value::String(raw.clone())
        };

        let table = root
            .entry((*section).to_owned())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
        if let Some(table) = table.as_table_mut() {
            table.insert((*key).to_owned(), value);
            applied = applied.saturating_add(1);
        }
    }
    Ok(applied)
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}
