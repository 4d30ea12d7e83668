//! Manifest operations - locating, reading and parsing
//!
//! Each plugin directory carries its manifest at a fixed relative path. The
//! body may be JSON or YAML; the format is detected from the content.

use crate::errors::{ManifestError, ParseError};
use crate::types::Manifest;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest file names, in lookup order
pub const MANIFEST_FILE_NAMES: &[&str] = &["plugin.json", "plugin.yaml", "plugin.yml"];

/// README file names, in lookup order
pub const README_FILE_NAMES: &[&str] = &[
    "README.md",
    "readme.md",
    "Readme.md",
    "README.markdown",
    "README",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
    /// JSON when the first non-whitespace character is `{`, YAML otherwise
    #[default]
    Auto,
}

impl ManifestFormat {
    /// Pick a format from a file extension, falling back to detection
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ManifestFormat::Json,
            Some("yaml" | "yml") => ManifestFormat::Yaml,
            _ => ManifestFormat::Auto,
        }
    }

    fn resolve(self, raw: &str) -> Self {
        match self {
            ManifestFormat::Auto if raw.trim_start().starts_with('{') => ManifestFormat::Json,
            ManifestFormat::Auto => ManifestFormat::Yaml,
            other => other,
        }
    }
}

/// Parse manifest text. The root must be an object.
pub fn parse_manifest(raw: &str, format: ManifestFormat) -> Result<Manifest, ParseError> {
    match format.resolve(raw) {
        ManifestFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(raw)?;
            let kind = match &value {
                serde_json::Value::Object(_) => None,
                serde_json::Value::Array(_) => Some("array"),
                serde_json::Value::Null => Some("null"),
                serde_json::Value::String(_) => Some("string"),
                serde_json::Value::Number(_) => Some("number"),
                serde_json::Value::Bool(_) => Some("boolean"),
            };
            if let Some(kind) = kind {
                return Err(ParseError::NotAnObject(kind));
            }
            Ok(serde_json::from_value(value)?)
        }
        _ => {
            let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
            let kind = match &value {
                serde_yaml::Value::Mapping(_) => None,
                serde_yaml::Value::Sequence(_) => Some("sequence"),
                serde_yaml::Value::Null => Some("null"),
                serde_yaml::Value::String(_) => Some("string"),
                serde_yaml::Value::Number(_) => Some("number"),
                serde_yaml::Value::Bool(_) => Some("boolean"),
                serde_yaml::Value::Tagged(_) => Some("tagged value"),
            };
            if let Some(kind) = kind {
                return Err(ParseError::NotAnObject(kind));
            }
            Ok(serde_yaml::from_value(value)?)
        }
    }
}

/// Find the manifest file inside a plugin directory
pub fn find_manifest(plugin_dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILE_NAMES
        .iter()
        .map(|name| plugin_dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Find the README inside a plugin directory
pub fn find_readme(plugin_dir: &Path) -> Option<PathBuf> {
    README_FILE_NAMES
        .iter()
        .map(|name| plugin_dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Read and parse the manifest from a plugin directory
pub fn read_manifest(plugin_dir: &Path) -> Result<(PathBuf, Manifest), ManifestError> {
    let path =
        find_manifest(plugin_dir).ok_or_else(|| ManifestError::NotFound(plugin_dir.to_path_buf()))?;
    debug!("Reading manifest {:?}", path);

    let content = fs::read_to_string(&path).map_err(|e| ManifestError::io(&path, e))?;
    let manifest = parse_manifest(&content, ManifestFormat::from_path(&path)).map_err(|e| {
        ManifestError::Parse {
            path: path.clone(),
            source: e,
        }
    })?;
    Ok((path, manifest))
}

/// Immediate subdirectories of `root` that contain a manifest, sorted by name
pub fn discover_plugin_dirs(root: &Path) -> Result<Vec<PathBuf>, ManifestError> {
    let entries = fs::read_dir(root).map_err(|e| ManifestError::io(root, e))?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            let has_manifest = find_manifest(path).is_some();
            if !has_manifest {
                debug!("Skipping {:?}: no manifest", path);
            }
            has_manifest
        })
        .collect();

    dirs.sort();
    Ok(dirs)
}
