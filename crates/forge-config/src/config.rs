//! `forge.toml` loading
//!
//! Values in the file are defaults for the command line; every flag the CLI
//! accepts overrides the matching entry here. Secrets are never read from
//! the file, only the *name* of the environment variable holding them.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ConfigError;

pub const CONFIG_ENV_VAR: &str = "FORGE_CONFIG";
pub const CONFIG_FILE_NAME: &str = "forge.toml";
pub const DEFAULT_PASSWORD_ENV: &str = "FORGE_OCI_PASSWORD";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ForgeConfig {
    pub package: PackageSection,
    pub oci: OciSection,
    pub release: ReleaseSection,
    pub docs: DocsSection,
    pub tools: ToolsSection,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct PackageSection {
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// `zip` or `tar.gz`
    pub format: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct OciSection {
    pub registry: Option<String>,
    pub username: Option<String>,
    /// Name of the environment variable that carries the registry password
    pub password_env: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReleaseSection {
    pub remote: Option<String>,
    /// `current-commit` or `plugin-only`
    pub strategy: Option<String>,
    /// `owner/name`, passed to `gh --repo`
    pub repo: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DocsSection {
    pub output_dir: Option<PathBuf>,
    pub branch: Option<String>,
    pub keep_versions: Option<usize>,
    pub template_dir: Option<PathBuf>,
    pub base_url: Option<String>,
    pub site_title: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolsSection {
    pub git: Option<PathBuf>,
    pub gh: Option<PathBuf>,
    pub oras: Option<PathBuf>,
}

impl ForgeConfig {
    /// Resolve the config file location.
    ///
    /// `FORGE_CONFIG` wins when set and non-empty, otherwise `./forge.toml`.
    pub fn path() -> PathBuf {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }
        PathBuf::from(CONFIG_FILE_NAME)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        self.package
            .source_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("plugins"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.package
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("dist"))
    }

    pub fn docs_output_dir(&self) -> PathBuf {
        self.docs
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("docs"))
    }

    pub fn remote(&self) -> String {
        self.release
            .remote
            .clone()
            .unwrap_or_else(|| "origin".to_string())
    }

    pub fn password_env(&self) -> String {
        self.oci
            .password_env
            .clone()
            .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Flattened `section.key = value` pairs for display
    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        fn path_value(p: &Option<PathBuf>) -> Option<String> {
            p.as_ref().map(|p| p.display().to_string())
        }

        let entries = [
            ("package.source-dir", path_value(&self.package.source_dir)),
            ("package.output-dir", path_value(&self.package.output_dir)),
            ("package.format", self.package.format.clone()),
            ("oci.registry", self.oci.registry.clone()),
            ("oci.username", self.oci.username.clone()),
            ("oci.password-env", self.oci.password_env.clone()),
            ("release.remote", self.release.remote.clone()),
            ("release.strategy", self.release.strategy.clone()),
            ("release.repo", self.release.repo.clone()),
            ("docs.output-dir", path_value(&self.docs.output_dir)),
            ("docs.branch", self.docs.branch.clone()),
            (
                "docs.keep-versions",
                self.docs.keep_versions.map(|k| k.to_string()),
            ),
            ("docs.template-dir", path_value(&self.docs.template_dir)),
            ("docs.base-url", self.docs.base_url.clone()),
            ("docs.site-title", self.docs.site_title.clone()),
            ("tools.git", path_value(&self.tools.git)),
            ("tools.gh", path_value(&self.tools.gh)),
            ("tools.oras", path_value(&self.tools.oras)),
        ];

        entries
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    }
}
