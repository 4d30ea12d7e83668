//! Versioned documentation site assembly
//!
//! For every plugin found in an [`ArchiveSource`] the newest versions are
//! fetched one at a time, their manifest and README are read straight out of
//! the archive, and a static site is written:
//!
//! ```text
//! index.html
//! versions.json
//! plugins/<name>/index.html
//! plugins/<name>/v<version>/index.html
//! ```

use crate::markdown::MarkdownRenderer;
use crate::source::{ArchiveSource, SourceArchive};
use crate::template::{base_vars, escape_html, render, TemplateSet, TemplateVars};
use crate::DocGenError;
use chrono::{SecondsFormat, Utc};
use forge_manifest::{
    compare_versions, parse_archive_name, parse_manifest, sanitize_name, Command, Manifest,
    ManifestFormat, MANIFEST_FILE_NAMES, README_FILE_NAMES,
};
use forge_package::{human_size, read_archive_entry};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

pub const DEFAULT_KEEP_VERSIONS: usize = 10;
pub const DEFAULT_SITE_TITLE: &str = "Plugin Documentation";

#[derive(Debug, Clone)]
pub struct DocsOptions {
    pub output_dir: PathBuf,
    /// Newest versions kept per plugin; 0 keeps all
    pub keep_versions: usize,
    pub site_title: String,
}

impl DocsOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            keep_versions: DEFAULT_KEEP_VERSIONS,
            site_title: DEFAULT_SITE_TITLE.to_string(),
        }
    }
}

/// One documented version of a plugin
#[derive(Debug, Clone)]
pub struct PluginVersion {
    pub version: String,
    pub manifest: Manifest,
    pub readme_html: Option<String>,
    pub archive_name: String,
    pub archive_url: String,
    pub archive_size_bytes: u64,
}

/// Documented versions of a plugin, newest first
#[derive(Debug, Clone)]
pub struct PluginVersionSet {
    pub name: String,
    pub versions: Vec<PluginVersion>,
}

impl PluginVersionSet {
    pub fn latest(&self) -> Option<&PluginVersion> {
        self.versions.first()
    }
}

/// A version that could not be documented
#[derive(Debug)]
pub struct VersionFailure {
    pub plugin: String,
    pub version: String,
    pub archive: String,
    pub error: DocGenError,
}

#[derive(Debug, Default)]
pub struct DocsReport {
    pub plugins: Vec<PluginVersionSet>,
    pub failures: Vec<VersionFailure>,
    pub pages_written: usize,
    /// Template placeholders nobody supplied a value for
    pub unresolved: BTreeSet<String>,
}

#[derive(Serialize)]
struct VersionsIndex<'a> {
    plugins: BTreeMap<&'a str, Vec<&'a str>>,
    generated: &'a str,
}

/// Group archives by plugin name, first occurrence of a version wins,
/// versions sorted newest first
fn group_archives(archives: Vec<SourceArchive>) -> BTreeMap<String, Vec<(String, SourceArchive)>> {
    let mut groups: BTreeMap<String, Vec<(String, SourceArchive)>> = BTreeMap::new();
    for archive in archives {
        let Some(parsed) = parse_archive_name(&archive.file_name) else {
            debug!("Skipping {}: not a plugin archive name", archive.file_name);
            continue;
        };
        // name and version become directories under plugins/
        if sanitize_name(&parsed.name) != parsed.name || !is_version_segment(&parsed.version) {
            warn!("Skipping {}: name or version is not usable as a path", archive.file_name);
            continue;
        }
        let versions = groups.entry(parsed.name).or_default();
        if versions.iter().any(|(v, _)| *v == parsed.version) {
            debug!("Skipping duplicate {}", archive.file_name);
            continue;
        }
        versions.push((parsed.version, archive));
    }
    for versions in groups.values_mut() {
        versions.sort_by(|(a, _), (b, _)| compare_versions(b, a));
    }
    groups
}

fn is_version_segment(version: &str) -> bool {
    !version.contains("..")
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
}

fn load_version<A, M>(
    source: &A,
    renderer: &M,
    archive: &SourceArchive,
    version: &str,
) -> Result<PluginVersion, DocGenError>
where
    A: ArchiveSource + ?Sized,
    M: MarkdownRenderer + ?Sized,
{
    let scratch = TempDir::new().map_err(DocGenError::Scratch)?;
    let local = source.fetch(archive, scratch.path())?;

    let archive_err = |e| DocGenError::Archive {
        archive: archive.file_name.clone(),
        source: e,
    };
    let entry = read_archive_entry(&local, MANIFEST_FILE_NAMES)
        .map_err(archive_err)?
        .ok_or_else(|| DocGenError::MissingManifest(archive.file_name.clone()))?;
    let manifest = parse_manifest(&entry.text(), ManifestFormat::from_path(Path::new(&entry.path)))
        .map_err(|e| DocGenError::Manifest {
            archive: archive.file_name.clone(),
            source: e,
        })?;

    let readme_html = read_archive_entry(&local, README_FILE_NAMES)
        .map_err(archive_err)?
        .map(|readme| renderer.render(&readme.text()));

    Ok(PluginVersion {
        version: version.to_string(),
        manifest,
        readme_html,
        archive_name: archive.file_name.clone(),
        archive_url: archive.url.clone(),
        archive_size_bytes: archive.size_bytes,
    })
}

/// Collect the newest `keep` loadable versions of every plugin in `source`
pub fn collect_versions<A, M>(
    source: &A,
    renderer: &M,
    keep: usize,
) -> Result<(Vec<PluginVersionSet>, Vec<VersionFailure>), DocGenError>
where
    A: ArchiveSource + ?Sized,
    M: MarkdownRenderer + ?Sized,
{
    let mut plugins = Vec::new();
    let mut failures = Vec::new();

    for (name, candidates) in group_archives(source.list()?) {
        let mut versions = Vec::new();
        for (version, archive) in candidates {
            if keep > 0 && versions.len() >= keep {
                break;
            }
            match load_version(source, renderer, &archive, &version) {
                Ok(loaded) => versions.push(loaded),
                Err(error) => {
                    warn!("Skipping {} {}: {}", name, version, error);
                    forge_logger::warn(&format!("Skipping {} {}: {}", name, version, error));
                    failures.push(VersionFailure {
                        plugin: name.clone(),
                        version,
                        archive: archive.file_name,
                        error,
                    });
                }
            }
        }

        if versions.is_empty() {
            warn!("No documentable versions of {}, omitting it", name);
            continue;
        }
        plugins.push(PluginVersionSet { name, versions });
    }

    Ok((plugins, failures))
}

fn command_list(commands: &[Command]) -> String {
    if commands.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul>\n");
    for command in commands {
        let _ = write!(
            html,
            "<li><code>{}</code>",
            escape_html(&command.name)
        );
        if let Some(kind) = &command.kind {
            let _ = write!(html, " <span class=\"muted\">({})</span>", escape_html(kind.as_str()));
        }
        if let Some(short) = &command.short {
            let _ = write!(html, " {}", escape_html(short));
        }
        if !command.flags.is_empty() {
            html.push_str("\n<table><tr><th>Flag</th><th>Description</th></tr>\n");
            for flag in &command.flags {
                let _ = writeln!(
                    html,
                    "<tr><td><code>--{}</code></td><td>{}</td></tr>",
                    escape_html(&flag.name),
                    escape_html(flag.description.as_deref().unwrap_or_default())
                );
            }
            html.push_str("</table>");
        }
        html.push_str(&command_list(&command.subcommands));
        html.push_str("</li>\n");
    }
    html.push_str("</ul>");
    html
}

fn or_dash(value: Option<&str>) -> String {
    value.map_or_else(|| "-".to_string(), escape_html)
}

fn version_page_vars(plugin: &PluginVersionSet, version: &PluginVersion, is_latest: bool) -> TemplateVars {
    let manifest = &version.manifest;
    let mut vars = TemplateVars::new();
    vars.insert("PLUGIN_NAME", escape_html(&plugin.name));
    vars.insert("VERSION", escape_html(&version.version));
    vars.insert(
        "LATEST_BADGE",
        if is_latest {
            "<span class=\"badge\">latest</span>".to_string()
        } else {
            String::new()
        },
    );
    vars.insert("DESCRIPTION", escape_html(manifest.description().unwrap_or_default()));
    vars.insert("AUTHOR", or_dash(manifest.author()));
    vars.insert("LICENSE", or_dash(manifest.license()));
    vars.insert(
        "HOMEPAGE",
        manifest.homepage().map_or_else(
            || "-".to_string(),
            |url| format!("<a href=\"{0}\">{0}</a>", escape_html(url)),
        ),
    );
    let tags: Vec<_> = manifest.tags().map(escape_html).collect();
    vars.insert("TAGS", if tags.is_empty() { "-".to_string() } else { tags.join(", ") });
    vars.insert("ARCHIVE_URL", escape_html(&version.archive_url));
    vars.insert("ARCHIVE_NAME", escape_html(&version.archive_name));
    vars.insert("ARCHIVE_SIZE", human_size(version.archive_size_bytes));
    vars.insert("COMMANDS", command_list(&manifest.commands));
    vars.insert(
        "README",
        version
            .readme_html
            .clone()
            .unwrap_or_else(|| "<p class=\"muted\">No README.</p>".to_string()),
    );
    vars
}

struct SiteWriter<'a> {
    base: TemplateVars,
    report: &'a mut DocsReport,
}

impl SiteWriter<'_> {
    fn write_page(&mut self, path: &Path, template: &str, vars: TemplateVars) -> Result<(), DocGenError> {
        let mut all = self.base.clone();
        all.extend(vars);
        let rendered = render(template, &all);
        if !rendered.unresolved.is_empty() {
            warn!(
                "Unresolved placeholders in {:?}: {}",
                path,
                rendered.unresolved.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            self.report.unresolved.extend(rendered.unresolved);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| DocGenError::io(parent, e))?;
        }
        fs::write(path, rendered.text).map_err(|e| DocGenError::io(path, e))?;
        self.report.pages_written += 1;
        Ok(())
    }
}

/// Write the HTML tree and `versions.json` for `plugins` into `options.output_dir`
fn write_site(
    plugins: &[PluginVersionSet],
    templates: &TemplateSet,
    options: &DocsOptions,
    report: &mut DocsReport,
) -> Result<(), DocGenError> {
    let out = &options.output_dir;
    let generated = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    // pages of versions that fell out of retention must not linger
    let plugins_dir = out.join("plugins");
    if plugins_dir.exists() {
        fs::remove_dir_all(&plugins_dir).map_err(|e| DocGenError::io(&plugins_dir, e))?;
    }
    fs::create_dir_all(&plugins_dir).map_err(|e| DocGenError::io(&plugins_dir, e))?;

    let mut writer = SiteWriter {
        base: base_vars(&options.site_title, &generated),
        report,
    };

    let mut plugin_list = String::from("<ul>\n");
    for plugin in plugins {
        let Some(latest) = plugin.latest() else {
            continue;
        };
        let plugin_dir = plugins_dir.join(&plugin.name);

        let mut version_list = String::from("<ul>\n");
        for (index, version) in plugin.versions.iter().enumerate() {
            let is_latest = index == 0;
            let page = plugin_dir.join(format!("v{}", version.version)).join("index.html");
            writer.write_page(
                &page,
                &templates.plugin,
                version_page_vars(plugin, version, is_latest),
            )?;
            let _ = writeln!(
                version_list,
                "<li><a href=\"v{0}/index.html\">v{0}</a>{1} <span class=\"muted\">{2}</span></li>",
                escape_html(&version.version),
                if is_latest { " <span class=\"badge\">latest</span>" } else { "" },
                escape_html(&version.archive_name)
            );
        }
        version_list.push_str("</ul>");

        let description = escape_html(latest.manifest.description().unwrap_or_default());
        let mut vars = TemplateVars::new();
        vars.insert("PLUGIN_NAME", escape_html(&plugin.name));
        vars.insert("DESCRIPTION", description.clone());
        vars.insert("LATEST_VERSION", escape_html(&latest.version));
        vars.insert("VERSION_LIST", version_list);
        writer.write_page(&plugin_dir.join("index.html"), &templates.versions, vars)?;

        let _ = writeln!(
            plugin_list,
            "<li><a href=\"plugins/{0}/index.html\">{0}</a> <span class=\"badge\">v{1}</span> {2}</li>",
            escape_html(&plugin.name),
            escape_html(&latest.version),
            description
        );
    }
    plugin_list.push_str("</ul>");

    let mut vars = TemplateVars::new();
    vars.insert("PLUGIN_COUNT", plugins.len().to_string());
    vars.insert("PLUGIN_LIST", plugin_list);
    writer.write_page(&out.join("index.html"), &templates.index, vars)?;

    let index = VersionsIndex {
        plugins: plugins
            .iter()
            .map(|p| {
                (
                    p.name.as_str(),
                    p.versions.iter().map(|v| v.version.as_str()).collect(),
                )
            })
            .collect(),
        generated: &generated,
    };
    let json_path = out.join("versions.json");
    let json = serde_json::to_string_pretty(&index).map_err(DocGenError::Json)?;
    fs::write(&json_path, json + "\n").map_err(|e| DocGenError::io(&json_path, e))?;
    Ok(())
}

/// Build the documentation site from `source`
pub fn generate<A, M>(
    source: &A,
    renderer: &M,
    templates: &TemplateSet,
    options: &DocsOptions,
) -> Result<DocsReport, DocGenError>
where
    A: ArchiveSource + ?Sized,
    M: MarkdownRenderer + ?Sized,
{
    let (plugins, failures) = collect_versions(source, renderer, options.keep_versions)?;

    let mut report = DocsReport {
        failures,
        ..Default::default()
    };
    write_site(&plugins, templates, options, &mut report)?;

    info!(
        "Generated docs for {} plugin(s) into {:?}",
        plugins.len(),
        options.output_dir
    );
    report.plugins = plugins;
    Ok(report)
}
