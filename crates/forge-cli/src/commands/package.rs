use super::{archive_format, write_outputs};
use crate::GlobalOpts;
use anyhow::Result;
use clap::Args;
use forge_manifest::ArchiveFormat;
use forge_package::{package_all_with_summary, PackageOptions, PackagedArtifact};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct PackageCommand {
    /// Directory containing one subdirectory per plugin (default: package.source-dir or ./plugins)
    pub dir: Option<PathBuf>,

    /// Where archives are written (default: package.output-dir or ./dist)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Archive format: zip or tar.gz
    #[arg(short, long)]
    pub format: Option<ArchiveFormat>,

    /// Succeed with whatever packaged even if some plugins failed
    #[arg(long)]
    pub best_effort: bool,
}

/// Package every plugin and report the result
pub fn package_root(
    root: &Path,
    output: &Path,
    options: &PackageOptions,
) -> Result<Vec<PackagedArtifact>> {
    forge_logger::step(&format!(
        "Packaging plugins from {} into {} ({})",
        root.display(),
        output.display(),
        options.format
    ));
    let outcome = package_all_with_summary(root, output, options)?;
    let summary = outcome.summary;
    forge_logger::info(&format!(
        "Packaged {} of {} plugin(s), {} failed",
        summary.packaged, summary.discovered, summary.failed
    ));
    Ok(outcome.into_result(options.best_effort)?)
}

pub fn handle_package(cmd: PackageCommand, opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    let root = cmd.dir.unwrap_or_else(|| config.source_dir());
    let output = cmd.output.unwrap_or_else(|| config.output_dir());
    let options = PackageOptions {
        format: archive_format(cmd.format, &config)?,
        best_effort: cmd.best_effort,
    };

    let artifacts = package_root(&root, &output, &options)?;
    for artifact in &artifacts {
        println!(
            "{}  {}  {} bytes",
            artifact.checksum,
            artifact.archive_path.display(),
            artifact.size_bytes
        );
    }
    write_outputs(&artifacts, None);
    Ok(())
}
