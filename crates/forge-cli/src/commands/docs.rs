use super::tool;
use crate::GlobalOpts;
use anyhow::{bail, Context, Result};
use clap::Args;
use forge_config::{ExternalTool, ForgeConfig};
use forge_docs::{
    generate, publish_docs_branch, ArchiveSource, CommonMarkRenderer, DocsBranchOptions,
    DocsOptions, LocalArchiveDir, ReleaseArchiveSource, TemplateSet, DEFAULT_KEEP_VERSIONS,
    DEFAULT_SITE_TITLE,
};
use forge_package::SystemRunner;
use forge_publish::GhCliStore;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct DocsCommand {
    /// Read archives from a local directory
    #[arg(long, value_name = "DIR", conflicts_with = "from_releases")]
    pub from_dir: Option<PathBuf>,

    /// Read archives from the repository's GitHub Releases
    #[arg(long)]
    pub from_releases: bool,

    /// Site output directory (default: docs.output-dir or ./docs)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Newest versions documented per plugin, 0 for all
    #[arg(long, value_name = "N")]
    pub keep: Option<usize>,

    /// Directory with plugin.html, versions.html and index.html overrides
    #[arg(long, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Force-push the generated site to this branch
    #[arg(long)]
    pub branch: Option<String>,

    /// Download link prefix for archives read with --from-dir
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Site title
    #[arg(long)]
    pub title: Option<String>,
}

/// Inputs for one documentation build
#[derive(Debug, Clone)]
pub(crate) struct DocsRequest {
    pub from_dir: Option<PathBuf>,
    pub output: PathBuf,
    pub keep: usize,
    pub templates: Option<PathBuf>,
    pub branch: Option<String>,
    pub base_url: Option<String>,
    pub title: String,
}

impl DocsRequest {
    pub(crate) fn from_config(config: &ForgeConfig) -> Self {
        Self {
            from_dir: None,
            output: config.docs_output_dir(),
            keep: config.docs.keep_versions.unwrap_or(DEFAULT_KEEP_VERSIONS),
            templates: config.docs.template_dir.clone(),
            branch: config.docs.branch.clone(),
            base_url: config.docs.base_url.clone(),
            title: config
                .docs
                .site_title
                .clone()
                .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
        }
    }
}

fn build_site<A: ArchiveSource>(source: &A, request: &DocsRequest) -> Result<()> {
    let templates = match &request.templates {
        Some(dir) => TemplateSet::load(dir)
            .with_context(|| format!("Failed to read templates from {}", dir.display()))?,
        None => TemplateSet::default(),
    };
    let options = DocsOptions {
        output_dir: request.output.clone(),
        keep_versions: request.keep,
        site_title: request.title.clone(),
    };

    forge_logger::spinner_start("Generating documentation");
    let report = match generate(source, &CommonMarkRenderer, &templates, &options) {
        Ok(report) => report,
        Err(e) => {
            forge_logger::spinner_error("Documentation generation failed");
            return Err(e.into());
        }
    };
    forge_logger::spinner_success(&format!(
        "Documented {} plugin(s) in {}",
        report.plugins.len(),
        request.output.display()
    ));

    for failure in &report.failures {
        forge_logger::warn(&format!(
            "Skipped {} {} ({}): {}",
            failure.plugin, failure.version, failure.archive, failure.error
        ));
    }
    if !report.unresolved.is_empty() {
        forge_logger::warn(&format!(
            "Unresolved template placeholders: {}",
            report.unresolved.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    Ok(())
}

/// Generate the site and optionally push it to the docs branch
pub(crate) fn run_docs(request: &DocsRequest, config: &ForgeConfig) -> Result<()> {
    match &request.from_dir {
        Some(dir) => {
            let mut source = LocalArchiveDir::new(dir);
            if let Some(base_url) = &request.base_url {
                source = source.with_base_url(base_url);
            }
            build_site(&source, request)?;
        }
        None => {
            let store = GhCliStore::new(
                SystemRunner,
                tool(ExternalTool::Gh, config)?,
                config.release.repo.clone(),
            );
            build_site(&ReleaseArchiveSource::new(store), request)?;
        }
    }

    if let Some(branch) = &request.branch {
        let options = DocsBranchOptions {
            git: tool(ExternalTool::Git, config)?,
            branch: branch.clone(),
            remote: config.remote(),
            ..Default::default()
        };
        publish_docs_branch(&SystemRunner, Path::new(&request.output), &options)?;
    }
    Ok(())
}

pub fn handle_docs(cmd: DocsCommand, opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    if cmd.from_dir.is_none() && !cmd.from_releases {
        bail!("Choose an archive source with --from-dir <DIR> or --from-releases");
    }

    let defaults = DocsRequest::from_config(&config);
    let request = DocsRequest {
        from_dir: cmd.from_dir,
        output: cmd.output.unwrap_or(defaults.output),
        keep: cmd.keep.unwrap_or(defaults.keep),
        templates: cmd.templates.or(defaults.templates),
        branch: cmd.branch.or(defaults.branch),
        base_url: cmd.base_url.or(defaults.base_url),
        title: cmd.title.unwrap_or(defaults.title),
    };
    run_docs(&request, &config)
}
