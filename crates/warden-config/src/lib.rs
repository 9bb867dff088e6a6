//! Warden Config - Layered configuration for the Warden tool-governance pipeline.
//!
//! Configuration is assembled from embedded defaults, the user file
//! (`~/.warden/config.toml`), the workspace file
//! (`{workspace}/.warden/config.toml`) and `WARDEN_*` environment variables,
//! in that order, then validated.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod loader;
mod types;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{LoadedConfig, load, load_file, load_with_env};
pub use types::{
    ApprovalSection, Config, IntentsSection, LoggingSection, RegistrySection, ToolsSection,
    TraceSection,
};
