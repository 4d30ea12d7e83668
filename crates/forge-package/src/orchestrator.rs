//! Package orchestration
//!
//! Walks a plugins root, validates each plugin and turns the valid ones into
//! archives with checksum sidecars. One broken plugin never stops the batch;
//! failures are collected and reported together at the end.

use crate::archive::{build_archive, list_archive, ArchiveError};
use crate::checksum::{compute_checksum, write_checksum_sidecar};
use forge_manifest::{
    archive_file_name, discover_plugin_dirs, read_manifest, sanitize_name, validate,
    ArchiveFormat, Manifest, ManifestError,
};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct PackageOptions {
    pub format: ArchiveFormat,
    /// Return whatever was built instead of failing when some plugins break
    pub best_effort: bool,
}

/// An archive produced by a packaging run
#[derive(Debug, Clone, Serialize)]
pub struct PackagedArtifact {
    pub name: String,
    pub version: String,
    pub archive_path: PathBuf,
    pub checksum: String,
    pub size_bytes: u64,
    /// Number of files stored in the archive
    pub file_count: usize,
    pub format: ArchiveFormat,
    pub checksum_path: PathBuf,
    #[serde(skip)]
    pub manifest: Manifest,
    pub source_dir: PathBuf,
}

impl PackagedArtifact {
    pub fn file_name(&self) -> String {
        self.archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Size for humans: `7 B`, `2.0 KB`, `1.5 MB`
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// A plugin directory that could not be packaged
#[derive(Debug, Clone, Serialize)]
pub struct PackageFailure {
    pub dir: PathBuf,
    pub reason: String,
}

impl fmt::Display for PackageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.dir.display(), self.reason)
    }
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Failed to read manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Plugin {name} is invalid: {}", errors.join("; "))]
    Invalid { name: String, errors: Vec<String> },

    #[error("Failed to build archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} plugin(s) failed to package: {}", failures.len(), join_failures(failures))]
    Partial {
        failures: Vec<PackageFailure>,
        artifacts: Vec<PackagedArtifact>,
    },
}

fn join_failures(failures: &[PackageFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Counters for one packaging run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub discovered: usize,
    pub packaged: usize,
    pub failed: usize,
}

/// Everything a packaging run produced, successful or not
#[derive(Debug, Default)]
pub struct PackageOutcome {
    pub artifacts: Vec<PackagedArtifact>,
    pub failures: Vec<PackageFailure>,
    pub summary: PackageSummary,
}

impl PackageOutcome {
    /// Apply the failure policy and hand back the artifacts
    pub fn into_result(self, best_effort: bool) -> Result<Vec<PackagedArtifact>, PackageError> {
        if self.failures.is_empty() || best_effort {
            Ok(self.artifacts)
        } else {
            Err(PackageError::Partial {
                failures: self.failures,
                artifacts: self.artifacts,
            })
        }
    }
}

fn create_output_dir(output_dir: &Path) -> Result<(), PackageError> {
    fs::create_dir_all(output_dir).map_err(|e| PackageError::OutputDir {
        path: output_dir.to_path_buf(),
        source: e,
    })
}

/// Validate and package a single plugin directory
pub fn package_plugin(
    plugin_dir: &Path,
    output_dir: &Path,
    format: ArchiveFormat,
) -> Result<PackagedArtifact, PackageError> {
    let (_, manifest) = read_manifest(plugin_dir)?;

    let result = validate(&manifest);
    let dir_name = plugin_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !result.is_valid() {
        return Err(PackageError::Invalid {
            name: manifest.name().unwrap_or(&dir_name).to_string(),
            errors: result.errors().to_vec(),
        });
    }

    // validation guarantees both are present
    let name = manifest.name().unwrap_or(&dir_name).to_string();
    let version = manifest.version().unwrap_or_default().to_string();

    create_output_dir(output_dir)?;
    let file_name = archive_file_name(&name, &version, format);
    let archive_path = output_dir.join(&file_name);
    let base_name = format!("{}-{}", sanitize_name(&name), version);

    debug!("Packaging {:?} into {:?}", plugin_dir, archive_path);
    build_archive(plugin_dir, &archive_path, &base_name, format)?;

    let io_err = |e| ArchiveError::Io {
        path: archive_path.clone(),
        source: e,
    };
    let checksum = compute_checksum(&archive_path).map_err(io_err)?;
    let checksum_path = write_checksum_sidecar(&archive_path, &checksum).map_err(io_err)?;
    let size_bytes = fs::metadata(&archive_path).map_err(io_err)?.len();
    let file_count = list_archive(&archive_path)?.len();

    info!(
        "Packaged {} {} ({}, {} files)",
        name,
        version,
        human_size(size_bytes),
        file_count
    );
    Ok(PackagedArtifact {
        name,
        version,
        archive_path,
        checksum,
        size_bytes,
        file_count,
        format,
        checksum_path,
        manifest,
        source_dir: plugin_dir.to_path_buf(),
    })
}

/// Package every plugin under `plugins_root`, keeping going past failures
pub fn package_all_with_summary(
    plugins_root: &Path,
    output_dir: &Path,
    options: &PackageOptions,
) -> Result<PackageOutcome, PackageError> {
    create_output_dir(output_dir)?;
    let dirs = discover_plugin_dirs(plugins_root)?;

    let mut outcome = PackageOutcome {
        summary: PackageSummary {
            discovered: dirs.len(),
            ..Default::default()
        },
        ..Default::default()
    };

    for dir in dirs {
        match package_plugin(&dir, output_dir, options.format) {
            Ok(artifact) => {
                forge_logger::success(&format!(
                    "Packaged {} v{} -> {}",
                    artifact.name,
                    artifact.version,
                    artifact.file_name()
                ));
                outcome.summary.packaged += 1;
                outcome.artifacts.push(artifact);
            }
            Err(e) => {
                warn!("Skipping {:?}: {}", dir, e);
                forge_logger::warn(&format!("Skipping {}: {}", dir.display(), e));
                outcome.summary.failed += 1;
                outcome.failures.push(PackageFailure {
                    dir,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}

/// Package every plugin under `plugins_root` and apply the failure policy
pub fn package_all(
    plugins_root: &Path,
    output_dir: &Path,
    options: &PackageOptions,
) -> Result<Vec<PackagedArtifact>, PackageError> {
    package_all_with_summary(plugins_root, output_dir, options)?.into_result(options.best_effort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify_checksum;
    use tempfile::TempDir;

    const DEMO: &str = r#"{
        "pkgName": "demo",
        "version": "1.0.0",
        "cmds": [{"name": "demo", "type": "executable", "executable": "bin/demo"}],
        "_metadata": {"author": "a", "license": "MIT"}
    }"#;

    fn write_plugin(root: &Path, dir: &str, manifest: &str) {
        let plugin = root.join(dir);
        assert!(fs::create_dir_all(plugin.join("bin")).is_ok());
        assert!(fs::write(plugin.join("plugin.json"), manifest).is_ok());
        assert!(fs::write(plugin.join("bin").join("demo"), "#!/bin/sh\necho hi\n").is_ok());
        assert!(fs::write(plugin.join("README.md"), "# Demo\n").is_ok());
    }

    #[test]
    fn test_package_single_valid_plugin() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("plugins");
        let out = temp_dir.path().join("dist");
        write_plugin(&root, "demo", DEMO);

        let Ok(artifacts) = package_all(&root, &out, &PackageOptions::default()) else {
            panic!("packaging should succeed");
        };
        assert_eq!(artifacts.len(), 1);
        let artifact = &artifacts[0];
        assert_eq!(artifact.name, "demo");
        assert_eq!(artifact.version, "1.0.0");
        assert!(artifact.archive_path.ends_with("demo-1.0.0.zip"));
        assert_eq!(artifact.checksum.len(), 64);
        assert!(artifact.size_bytes > 0);
        assert_eq!(artifact.file_count, 3);
        assert!(out.join("demo-1.0.0.zip.sha256").is_file());
        assert!(verify_checksum(&artifact.archive_path, &artifact.checksum));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(7), "7 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn test_empty_root_is_empty_ok() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("plugins");
        assert!(fs::create_dir_all(&root).is_ok());
        let out = temp_dir.path().join("dist");

        let result = package_all(&root, &out, &PackageOptions::default());
        assert!(result.is_ok_and(|a| a.is_empty()));
        assert!(out.is_dir());
    }

    #[test]
    fn test_invalid_plugin_is_reported_and_others_still_built() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("plugins");
        let out = temp_dir.path().join("dist");
        write_plugin(&root, "a-broken", r#"{"pkgName": "broken", "cmds": []}"#);
        write_plugin(&root, "b-demo", DEMO);
        write_plugin(&root, "c-garbage", "{ not json");

        let Ok(outcome) = package_all_with_summary(&root, &out, &PackageOptions::default())
        else {
            panic!("batch should run");
        };
        assert_eq!(
            outcome.summary,
            PackageSummary {
                discovered: 3,
                packaged: 1,
                failed: 2
            }
        );
        assert!(outcome.failures[0].dir.ends_with("a-broken"));
        assert!(outcome.failures[0].reason.contains("Missing required field: version"));
        assert!(outcome.failures[1].dir.ends_with("c-garbage"));

        match outcome.into_result(false) {
            Err(PackageError::Partial {
                failures,
                artifacts,
            }) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(artifacts.len(), 1);
            }
            other => panic!("expected partial failure, got {:?}", other.map(|a| a.len())),
        }
    }

    #[test]
    fn test_best_effort_returns_successes() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("plugins");
        let out = temp_dir.path().join("dist");
        write_plugin(&root, "broken", r#"{"version": "1.0.0", "cmds": []}"#);
        write_plugin(&root, "demo", DEMO);

        let options = PackageOptions {
            format: ArchiveFormat::TarGz,
            best_effort: true,
        };
        let result = package_all(&root, &out, &options);
        assert!(result.is_ok_and(|a| {
            a.len() == 1 && a[0].archive_path.ends_with("demo-1.0.0.tar.gz")
        }));
    }

    #[test]
    fn test_archive_name_uses_sanitized_name() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("plugins");
        let out = temp_dir.path().join("dist");
        write_plugin(
            &root,
            "cool",
            r#"{"pkgName": "My Cool Tool", "version": "0.2.0",
                "cmds": [{"name": "cool", "type": "alias"}]}"#,
        );

        let Ok(artifact) = package_plugin(&root.join("cool"), &out, ArchiveFormat::Zip) else {
            panic!("plugin should package");
        };
        assert_eq!(artifact.name, "My Cool Tool");
        assert_eq!(artifact.file_name(), "my-cool-tool-0.2.0.zip");
    }
}
