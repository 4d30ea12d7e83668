use super::package::package_root;
use super::{archive_format, publish_artifacts, tag_strategy, write_outputs, PublishSettings, PublishTarget};
use crate::GlobalOpts;
use anyhow::Result;
use clap::Args;
use forge_config::ForgeConfig;
use forge_manifest::ArchiveFormat;
use forge_package::PackageOptions;
use std::path::PathBuf;

/// Registry and release flags shared by `publish` and `run`
#[derive(Args, Debug, Clone, Default)]
pub struct RegistryArgs {
    /// OCI registry and namespace, e.g. ghcr.io/acme/plugins
    #[arg(long)]
    pub registry: Option<String>,

    /// Registry username; the password is read from --password-env
    #[arg(long)]
    pub username: Option<String>,

    /// Environment variable holding the registry password (default: FORGE_OCI_PASSWORD)
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,

    /// Replace publications that already exist
    #[arg(long)]
    pub force: bool,
}

impl RegistryArgs {
    pub(crate) fn settings(
        &self,
        target: PublishTarget,
        strategy: Option<String>,
        remote: Option<String>,
        config: &ForgeConfig,
    ) -> Result<PublishSettings> {
        Ok(PublishSettings {
            target,
            registry: self.registry.clone().or_else(|| config.oci.registry.clone()),
            username: self.username.clone().or_else(|| config.oci.username.clone()),
            password_env: self
                .password_env
                .clone()
                .unwrap_or_else(|| config.password_env()),
            force: self.force,
            strategy: tag_strategy(strategy, config)?,
            remote: remote.unwrap_or_else(|| config.remote()),
            repo: config.release.repo.clone(),
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct PublishCommand {
    /// Directory containing one subdirectory per plugin (default: package.source-dir or ./plugins)
    pub dir: Option<PathBuf>,

    /// Where archives are written (default: package.output-dir or ./dist)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Archive format: zip or tar.gz (OCI needs tar.gz)
    #[arg(short, long)]
    pub format: Option<ArchiveFormat>,

    /// Destination of the archives
    #[arg(long, value_enum, default_value = "release")]
    pub target: PublishTarget,

    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Release tag strategy: current-commit or plugin-only
    #[arg(long)]
    pub strategy: Option<String>,

    /// Git remote receiving release tags (default: origin)
    #[arg(long)]
    pub remote: Option<String>,
}

pub fn handle_publish(cmd: PublishCommand, opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    let root = cmd.dir.unwrap_or_else(|| config.source_dir());
    let output = cmd.output.unwrap_or_else(|| config.output_dir());
    let format = match (cmd.format, cmd.target) {
        (None, PublishTarget::Oci) => ArchiveFormat::TarGz,
        (flag, _) => archive_format(flag, &config)?,
    };
    let settings = cmd
        .registry
        .settings(cmd.target, cmd.strategy, cmd.remote, &config)?;

    let options = PackageOptions {
        format,
        best_effort: false,
    };
    let artifacts = package_root(&root, &output, &options)?;
    let summary = publish_artifacts(&artifacts, &settings, &config)?;

    forge_logger::success(&format!(
        "Published {} artifact(s), skipped {}",
        summary.pushed_count(),
        summary.skipped_count()
    ));
    write_outputs(&artifacts, Some(&summary));
    Ok(())
}
