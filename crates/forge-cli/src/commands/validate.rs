use crate::GlobalOpts;
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use forge_manifest::{validate_all, ValidationReport};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct ValidateCommand {
    /// Directory containing one subdirectory per plugin (default: package.source-dir or ./plugins)
    pub dir: Option<PathBuf>,

    /// Print the full report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Validate every plugin under `root` and print the outcome.
/// Returns the report; callers decide whether invalid plugins are fatal.
pub fn validate_root(root: &Path, opts: &GlobalOpts) -> Result<ValidationReport> {
    let report = validate_all(root)?;

    if report.plugins.is_empty() {
        forge_logger::warn(&format!("No plugins found in {}", root.display()));
        return Ok(report);
    }

    for plugin in &report.plugins {
        let result = &plugin.result;
        if result.is_valid() {
            forge_logger::success(&format!("{} is valid", plugin.name));
        } else {
            forge_logger::error(&format!(
                "{} ({}) is invalid",
                plugin.name,
                plugin.dir.display()
            ));
            for error in result.errors() {
                eprintln!("  {} {}", "-".red(), error);
            }
        }
        for warning in result.warnings() {
            if opts.verbosity_level() > 0 || !result.is_valid() {
                eprintln!("  {} {}", "warning:".yellow(), warning);
            } else {
                forge_logger::warn(&format!("{}: {}", plugin.name, warning));
            }
        }
    }

    let invalid = report.invalid().count();
    forge_logger::info(&format!(
        "Validated {} plugin(s): {} invalid, {} warning(s)",
        report.plugins.len(),
        invalid,
        report.warning_count()
    ));
    Ok(report)
}

pub fn handle_validate(cmd: ValidateCommand, opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    let root = cmd.dir.unwrap_or_else(|| config.source_dir());

    let report = validate_root(&root, opts)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let invalid = report.invalid().count();
    if invalid > 0 {
        bail!("{} plugin(s) failed validation", invalid);
    }
    Ok(())
}
