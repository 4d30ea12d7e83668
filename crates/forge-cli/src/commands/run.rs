//! Action-style entry point: validate, package, publish and document in one go

use super::docs::{run_docs, DocsRequest};
use super::package::package_root;
use super::publish::RegistryArgs;
use super::validate::validate_root;
use super::{publish_artifacts, write_outputs, PublishTarget};
use crate::GlobalOpts;
use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use forge_manifest::ArchiveFormat;
use forge_package::PackageOptions;
use std::path::PathBuf;

/// Output format of a run; `oci` and `both` imply tar.gz archives
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFormat {
    Zip,
    #[value(name = "tar.gz")]
    TarGz,
    Oci,
    Both,
}

impl RunFormat {
    pub fn archive_format(self) -> ArchiveFormat {
        match self {
            RunFormat::Zip => ArchiveFormat::Zip,
            RunFormat::TarGz | RunFormat::Oci | RunFormat::Both => ArchiveFormat::TarGz,
        }
    }

    pub fn target(self) -> PublishTarget {
        match self {
            RunFormat::Zip | RunFormat::TarGz => PublishTarget::Release,
            RunFormat::Oci => PublishTarget::Oci,
            RunFormat::Both => PublishTarget::Both,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Directory containing one subdirectory per plugin (default: package.source-dir or ./plugins)
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Where archives are written (default: package.output-dir or ./dist)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// zip, tar.gz, oci or both
    #[arg(long, value_enum, default_value = "zip")]
    pub format: RunFormat,

    /// Stop after validation
    #[arg(long)]
    pub validate_only: bool,

    /// Package without publishing
    #[arg(long)]
    pub skip_publish: bool,

    #[command(flatten)]
    pub registry: RegistryArgs,

    /// Generate documentation after publishing
    #[arg(long)]
    pub docs: bool,

    /// Branch receiving the generated documentation
    #[arg(long)]
    pub docs_branch: Option<String>,

    /// Newest versions documented per plugin
    #[arg(long, value_name = "N")]
    pub keep_versions: Option<usize>,
}

pub fn handle_run(cmd: RunCommand, opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    let source = cmd.source.unwrap_or_else(|| config.source_dir());
    let output = cmd.output.unwrap_or_else(|| config.output_dir());

    let report = validate_root(&source, opts)?;
    let invalid = report.invalid().count();
    if invalid > 0 {
        bail!("{} plugin(s) failed validation", invalid);
    }
    if cmd.validate_only {
        forge_logger::success("Validation passed");
        return Ok(());
    }

    let options = PackageOptions {
        format: cmd.format.archive_format(),
        best_effort: false,
    };
    let artifacts = package_root(&source, &output, &options)?;

    let summary = if cmd.skip_publish {
        None
    } else {
        let settings = cmd
            .registry
            .settings(cmd.format.target(), None, None, &config)?;
        let summary = publish_artifacts(&artifacts, &settings, &config)?;
        forge_logger::success(&format!(
            "Published {} artifact(s), skipped {}",
            summary.pushed_count(),
            summary.skipped_count()
        ));
        Some(summary)
    };
    write_outputs(&artifacts, summary.as_ref());

    if cmd.docs {
        let mut request = DocsRequest::from_config(&config);
        // OCI-only runs have no releases to read from
        if cmd.skip_publish || !cmd.format.target().includes_release() {
            request.from_dir = Some(output);
        }
        if let Some(branch) = cmd.docs_branch {
            request.branch = Some(branch);
        }
        if let Some(keep) = cmd.keep_versions {
            request.keep = keep;
        }
        run_docs(&request, &config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_format_mapping() {
        assert_eq!(RunFormat::Zip.archive_format(), ArchiveFormat::Zip);
        assert_eq!(RunFormat::Oci.archive_format(), ArchiveFormat::TarGz);
        assert_eq!(RunFormat::TarGz.target(), PublishTarget::Release);
        assert_eq!(RunFormat::Both.target(), PublishTarget::Both);
        assert!(RunFormat::Both.target().includes_oci());
    }
}
