pub mod config;
pub mod docs;
pub mod package;
pub mod publish;
pub mod run;
pub mod validate;

use anyhow::{bail, Context, Result};
use forge_config::{resolve_tool, ExternalTool, ForgeConfig};
use forge_manifest::ArchiveFormat;
use forge_package::{PackagedArtifact, SystemRunner};
use forge_publish::{
    GhCliStore, OciCredentials, OciOptions, OciPublisher, PublishSummary, ReleaseOptions,
    ReleasePublisher, TagStrategy,
};
use serde::Serialize;
use std::path::Path;

/// Where packaged archives are published
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    Release,
    Oci,
    Both,
}

impl PublishTarget {
    pub fn includes_release(self) -> bool {
        matches!(self, PublishTarget::Release | PublishTarget::Both)
    }

    pub fn includes_oci(self) -> bool {
        matches!(self, PublishTarget::Oci | PublishTarget::Both)
    }
}

/// Everything the publishers need, after merging flags over `forge.toml`
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub target: PublishTarget,
    pub registry: Option<String>,
    pub username: Option<String>,
    pub password_env: String,
    pub force: bool,
    pub strategy: TagStrategy,
    pub remote: String,
    pub repo: Option<String>,
}

pub(crate) fn tool(tool: ExternalTool, config: &ForgeConfig) -> Result<String> {
    let path = resolve_tool(tool, config)?;
    Ok(path.display().to_string())
}

pub(crate) fn archive_format(flag: Option<ArchiveFormat>, config: &ForgeConfig) -> Result<ArchiveFormat> {
    match (flag, config.package.format.as_deref()) {
        (Some(format), _) => Ok(format),
        (None, Some(value)) => value
            .parse()
            .map_err(|e: String| anyhow::anyhow!("package.format in config: {}", e)),
        (None, None) => Ok(ArchiveFormat::default()),
    }
}

pub(crate) fn tag_strategy(flag: Option<String>, config: &ForgeConfig) -> Result<TagStrategy> {
    match flag.or_else(|| config.release.strategy.clone()) {
        Some(value) => Ok(value.parse()?),
        None => Ok(TagStrategy::default()),
    }
}

fn oci_credentials(username: Option<&str>, password_env: &str) -> Result<Option<OciCredentials>> {
    let Some(username) = username else {
        return Ok(None);
    };
    let password = std::env::var(password_env)
        .with_context(|| format!("Registry username given but ${} is not set", password_env))?;
    Ok(Some(OciCredentials {
        username: username.to_string(),
        password,
    }))
}

/// Publish to every destination in `settings.target`, stopping at the first failure
pub(crate) fn publish_artifacts(
    artifacts: &[PackagedArtifact],
    settings: &PublishSettings,
    config: &ForgeConfig,
) -> Result<PublishSummary> {
    let mut summary = PublishSummary::default();

    if settings.target.includes_oci() {
        let Some(registry) = settings.registry.clone() else {
            bail!("OCI publishing needs --registry or [oci] registry in the config");
        };
        if let Some(zip) = artifacts.iter().find(|a| a.format == ArchiveFormat::Zip) {
            bail!(
                "OCI layers must be tar.gz archives, got {}; package with --format tar.gz",
                zip.file_name()
            );
        }
        let options = OciOptions {
            registry,
            credentials: oci_credentials(settings.username.as_deref(), &settings.password_env)?,
            force: settings.force,
        };
        let publisher = OciPublisher::new(SystemRunner, tool(ExternalTool::Oras, config)?, options);
        summary.merge(publisher.publish(artifacts)?);
    }

    if settings.target.includes_release() {
        let store = GhCliStore::new(
            SystemRunner,
            tool(ExternalTool::Gh, config)?,
            settings.repo.clone(),
        );
        let options = ReleaseOptions {
            remote: settings.remote.clone(),
            force: settings.force,
            strategy: settings.strategy,
        };
        let publisher =
            ReleasePublisher::new(SystemRunner, tool(ExternalTool::Git, config)?, store, options);
        summary.merge(publisher.publish(artifacts)?);
    }

    Ok(summary.finish()?)
}

#[derive(Serialize)]
struct PackageOutput<'a> {
    name: &'a str,
    version: &'a str,
    path: &'a Path,
    checksum: &'a str,
    size: u64,
    files: usize,
}

/// Step outputs for the surrounding GitHub Actions job
pub(crate) fn write_outputs(artifacts: &[PackagedArtifact], summary: Option<&PublishSummary>) {
    let packages: Vec<_> = artifacts
        .iter()
        .map(|a| PackageOutput {
            name: &a.name,
            version: &a.version,
            path: &a.archive_path,
            checksum: &a.checksum,
            size: a.size_bytes,
            files: a.file_count,
        })
        .collect();

    let mut outputs = vec![(
        "packages",
        serde_json::to_string(&packages).unwrap_or_else(|_| "[]".to_string()),
    )];
    if let Some(summary) = summary {
        outputs.push(("pushed-count", summary.pushed_count().to_string()));
        outputs.push(("skipped-count", summary.skipped_count().to_string()));
    }

    for (name, value) in outputs {
        if let Err(e) = forge_logger::set_output(name, &value) {
            forge_logger::warn(&format!("Failed to write step output {}: {}", name, e));
        }
    }
}
