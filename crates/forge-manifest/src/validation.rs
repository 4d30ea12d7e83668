//! Manifest validation
//!
//! Every rule is evaluated on every call so a single run surfaces all
//! problems at once. Errors make a manifest invalid; warnings never do.

use crate::errors::ManifestError;
use crate::manifest::{discover_plugin_dirs, find_readme, read_manifest};
use crate::naming::sanitize_name;
use crate::types::{Command, CommandKind, Manifest};
use crate::version::is_semver;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

static COMMAND_NAME_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").ok());

pub const MISSING_PKG_NAME: &str = "Missing required field: pkgName";
pub const MISSING_VERSION: &str = "Missing required field: version";
pub const MISSING_COMMANDS: &str = "Missing required field: cmds (must have at least one command)";

/// Outcome of validating one manifest. Read-only once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// A result carrying a single error, for manifests that never parsed
    pub fn failed(error: impl Into<String>) -> Self {
        Self::from_parts(vec![error.into()], Vec::new())
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn with_warning(mut self, warning: String) -> Self {
        self.warnings.push(warning);
        self
    }
}

pub fn is_valid_command_name(name: &str) -> bool {
    COMMAND_NAME_RE
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// Validate a parsed manifest. Never fails.
pub fn validate(manifest: &Manifest) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match manifest.name() {
        None => errors.push(MISSING_PKG_NAME.to_string()),
        Some(name) if !sanitize_name(name).chars().any(|c| c.is_ascii_alphanumeric()) => {
            errors.push(format!(
                "Invalid pkgName: '{}' has no ASCII letters or digits to build an archive name from",
                name
            ));
        }
        Some(_) => {}
    }

    match manifest.version.as_deref() {
        None => errors.push(MISSING_VERSION.to_string()),
        Some(v) if v.trim().is_empty() => errors.push(MISSING_VERSION.to_string()),
        Some(v) if !is_semver(v) => errors.push(format!("Invalid version format: {}", v)),
        Some(_) => {}
    }

    if manifest.commands.is_empty() {
        errors.push(MISSING_COMMANDS.to_string());
    }

    for (index, command) in manifest.commands.iter().enumerate() {
        check_command(command, &format!("#{}", index + 1), &mut errors, &mut warnings);
    }

    if manifest.author().is_none() {
        warnings.push("Missing recommended field: _metadata.author".to_string());
    }
    if manifest.license().is_none() {
        warnings.push("Missing recommended field: _metadata.license".to_string());
    }

    ValidationResult::from_parts(errors, warnings)
}

fn check_command(
    command: &Command,
    position: &str,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let label = if command.name.is_empty() {
        position.to_string()
    } else {
        format!("'{}'", command.name)
    };

    if command.name.is_empty() {
        errors.push(format!("Command {} is missing required field: name", position));
    } else if !is_valid_command_name(&command.name) {
        errors.push(format!(
            "Command name '{}' contains invalid characters (use lowercase letters, digits and hyphens)",
            command.name
        ));
    }

    match &command.kind {
        None => errors.push(format!("Command {} is missing required field: type", label)),
        Some(CommandKind::Unknown(other)) => errors.push(format!(
            "Command {} has invalid type '{}' (expected executable, alias or group)",
            label, other
        )),
        Some(CommandKind::Executable) => {
            let has_path = command
                .executable
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty());
            if !has_path {
                errors.push(format!(
                    "Command {} of type executable must specify an executable path",
                    label
                ));
            }
        }
        Some(CommandKind::Group) if command.subcommands.is_empty() => {
            warnings.push(format!("Command {} is a group without subcommands", label));
        }
        Some(_) => {}
    }

    for (index, sub) in command.subcommands.iter().enumerate() {
        let sub_position = format!("{} > #{}", label, index + 1);
        check_command(sub, &sub_position, errors, warnings);
    }
}

/// Validation of one plugin directory
#[derive(Debug, Clone, Serialize)]
pub struct PluginValidation {
    pub dir: PathBuf,
    pub manifest_path: Option<PathBuf>,
    /// `pkgName` when available, otherwise the directory name
    pub name: String,
    pub result: ValidationResult,
}

/// Read, parse and validate a plugin directory, including the README check
pub fn validate_plugin_dir(dir: &Path) -> Result<(Manifest, ValidationResult), ManifestError> {
    let (_, manifest) = read_manifest(dir)?;
    let mut result = validate(&manifest);
    if find_readme(dir).is_none() {
        result = result.with_warning("Missing README.md in plugin directory".to_string());
    }
    Ok((manifest, result))
}

/// Aggregate result of validating every plugin under a root
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub plugins: Vec<PluginValidation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.plugins.iter().all(|p| p.result.is_valid())
    }

    pub fn invalid(&self) -> impl Iterator<Item = &PluginValidation> {
        self.plugins.iter().filter(|p| !p.result.is_valid())
    }

    pub fn warning_count(&self) -> usize {
        self.plugins.iter().map(|p| p.result.warnings().len()).sum()
    }
}

/// Validate every plugin directory under `root`, collecting all failures
pub fn validate_all(root: &Path) -> Result<ValidationReport, ManifestError> {
    let mut report = ValidationReport::default();

    for dir in discover_plugin_dirs(root)? {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let plugin = match validate_plugin_dir(&dir) {
            Ok((manifest, result)) => PluginValidation {
                manifest_path: crate::manifest::find_manifest(&dir),
                name: manifest.name().unwrap_or(&dir_name).to_string(),
                dir,
                result,
            },
            Err(e) => PluginValidation {
                manifest_path: crate::manifest::find_manifest(&dir),
                name: dir_name,
                dir,
                result: ValidationResult::failed(e.to_string()),
            },
        };
        debug!(
            "Validated {}: valid={} errors={} warnings={}",
            plugin.name,
            plugin.result.is_valid(),
            plugin.result.errors().len(),
            plugin.result.warnings().len()
        );
        report.plugins.push(plugin);
    }

    Ok(report)
}
