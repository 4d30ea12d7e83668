//! Resolution of the external binaries plugin-forge drives
//!
//! An explicit path from `[tools]` wins; otherwise the binary is looked up on
//! `PATH`.

use std::path::{Path, PathBuf};

use crate::{ConfigError, ForgeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalTool {
    Git,
    Gh,
    Oras,
}

impl ExternalTool {
    pub const fn binary_name(self) -> &'static str {
        match self {
            ExternalTool::Git => "git",
            ExternalTool::Gh => "gh",
            ExternalTool::Oras => "oras",
        }
    }

    fn configured(self, config: &ForgeConfig) -> Option<&Path> {
        match self {
            ExternalTool::Git => config.tools.git.as_deref(),
            ExternalTool::Gh => config.tools.gh.as_deref(),
            ExternalTool::Oras => config.tools.oras.as_deref(),
        }
    }
}

/// Resolve the path to an external tool
pub fn resolve_tool(tool: ExternalTool, config: &ForgeConfig) -> Result<PathBuf, ConfigError> {
    if let Some(path) = tool.configured(config) {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::ToolNotFound {
            tool: tool.binary_name(),
            detail: format!("configured path {} is not a file", path.display()),
        });
    }

    which::which(tool.binary_name()).map_err(|e| ConfigError::ToolNotFound {
        tool: tool.binary_name(),
        detail: e.to_string(),
    })
}
