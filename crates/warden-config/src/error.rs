//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// File path
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A config file is not valid TOML or does not match the schema.
    #[error("failed to parse {path}: {source}")]
    ParseError {
        /// File path or layer name
        path: String,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid value for {field}: {message}")]
    ValidationError {
        /// Dotted field path
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// The user's home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
