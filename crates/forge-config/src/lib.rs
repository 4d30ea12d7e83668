//! Configuration for plugin-forge
//!
//! This crate owns the `forge.toml` schema and the lookup of the external
//! tools (`git`, `gh`, `oras`) the publishing steps shell out to.

pub mod config;
pub mod tools;

pub use config::{ForgeConfig, CONFIG_ENV_VAR, DEFAULT_PASSWORD_ENV};
pub use tools::{resolve_tool, ExternalTool};

use std::path::PathBuf;

/// Error type for configuration loading and tool resolution
#[derive(Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read or written
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML for the expected schema
    Parse { path: PathBuf, message: String },
    /// An external tool could not be located
    ToolNotFound { tool: &'static str, detail: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to access config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Invalid config {}: {}", path.display(), message)
            }
            ConfigError::ToolNotFound { tool, detail } => {
                write!(f, "Required tool '{}' not found: {}", tool, detail)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
