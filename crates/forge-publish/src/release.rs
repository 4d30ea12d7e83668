//! GitHub Release publishing
//!
//! Tags are created and pushed with `git`; releases and their assets live in
//! a [`ReleaseStore`]. [`GhCliStore`] talks to GitHub through the `gh` CLI.

use crate::summary::{PublishError, PublishSummary};
use forge_manifest::{sanitize_name, ArchiveFormat};
use forge_package::{human_size, CommandRunner, CommandSpec, PackagedArtifact};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// An asset attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    #[serde(skip)]
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
}

/// Where releases and their assets are stored
pub trait ReleaseStore {
    fn release_exists(&self, tag: &str) -> Result<bool, PublishError>;

    fn delete_release(&self, tag: &str) -> Result<(), PublishError>;

    fn create_release(
        &self,
        tag: &str,
        title: &str,
        notes: &str,
        assets: &[PathBuf],
    ) -> Result<(), PublishError>;

    /// Every asset of every release
    fn list_assets(&self) -> Result<Vec<ReleaseAsset>, PublishError>;

    /// Download one asset into `dest_dir`, returning the local path
    fn download_asset(&self, asset: &ReleaseAsset, dest_dir: &Path)
        -> Result<PathBuf, PublishError>;
}

impl<T: ReleaseStore + ?Sized> ReleaseStore for &T {
    fn release_exists(&self, tag: &str) -> Result<bool, PublishError> {
        (**self).release_exists(tag)
    }

    fn delete_release(&self, tag: &str) -> Result<(), PublishError> {
        (**self).delete_release(tag)
    }

    fn create_release(
        &self,
        tag: &str,
        title: &str,
        notes: &str,
        assets: &[PathBuf],
    ) -> Result<(), PublishError> {
        (**self).create_release(tag, title, notes, assets)
    }

    fn list_assets(&self) -> Result<Vec<ReleaseAsset>, PublishError> {
        (**self).list_assets()
    }

    fn download_asset(
        &self,
        asset: &ReleaseAsset,
        dest_dir: &Path,
    ) -> Result<PathBuf, PublishError> {
        (**self).download_asset(asset, dest_dir)
    }
}

/// Release store backed by the `gh` CLI
pub struct GhCliStore<R> {
    runner: R,
    gh: String,
    repo: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseListEntry {
    tag_name: String,
}

#[derive(Deserialize)]
struct ReleaseView {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

impl<R: CommandRunner> GhCliStore<R> {
    pub fn new(runner: R, gh: impl Into<String>, repo: Option<String>) -> Self {
        Self {
            runner,
            gh: gh.into(),
            repo,
        }
    }

    fn gh<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(self.gh.as_str()).args(args);
        match &self.repo {
            Some(repo) => spec.args(["--repo", repo.as_str()]),
            None => spec,
        }
    }

    fn json<T: for<'de> Deserialize<'de>>(&self, spec: &CommandSpec) -> Result<T, PublishError> {
        let output = self.runner.run_checked(spec)?;
        serde_json::from_str(&output.stdout).map_err(|source| PublishError::Output {
            command: spec.display(),
            source,
        })
    }
}

impl<R: CommandRunner> ReleaseStore for GhCliStore<R> {
    fn release_exists(&self, tag: &str) -> Result<bool, PublishError> {
        let spec = self.gh(["release", "view", tag, "--json", "tagName"]);
        Ok(self.runner.run(&spec)?.success())
    }

    fn delete_release(&self, tag: &str) -> Result<(), PublishError> {
        let spec = self.gh(["release", "delete", tag, "--yes"]);
        self.runner.run_checked(&spec)?;
        Ok(())
    }

    fn create_release(
        &self,
        tag: &str,
        title: &str,
        notes: &str,
        assets: &[PathBuf],
    ) -> Result<(), PublishError> {
        let spec = self
            .gh(["release", "create", tag])
            .args(assets.iter().map(|p| p.display().to_string()))
            .args(["--title", title, "--notes-file", "-"])
            .stdin(notes);
        self.runner.run_checked(&spec)?;
        Ok(())
    }

    fn list_assets(&self) -> Result<Vec<ReleaseAsset>, PublishError> {
        let releases: Vec<ReleaseListEntry> =
            self.json(&self.gh(["release", "list", "--limit", "1000", "--json", "tagName"]))?;

        let mut assets = Vec::new();
        for release in releases {
            let view: ReleaseView = self.json(&self.gh([
                "release",
                "view",
                release.tag_name.as_str(),
                "--json",
                "assets",
            ]))?;
            assets.extend(view.assets.into_iter().map(|asset| ReleaseAsset {
                tag: release.tag_name.clone(),
                ..asset
            }));
        }
        debug!("Found {} release assets", assets.len());
        Ok(assets)
    }

    fn download_asset(
        &self,
        asset: &ReleaseAsset,
        dest_dir: &Path,
    ) -> Result<PathBuf, PublishError> {
        let dest = dest_dir.display().to_string();
        let spec = self.gh([
            "release",
            "download",
            asset.tag.as_str(),
            "--pattern",
            asset.name.as_str(),
            "--dir",
            dest.as_str(),
            "--clobber",
        ]);
        self.runner.run_checked(&spec)?;
        Ok(dest_dir.join(&asset.name))
    }
}

/// How the release tag is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagStrategy {
    /// Annotated tag on the current `HEAD`
    #[default]
    CurrentCommit,
    /// Tag an orphan commit whose tree is only the plugin directory
    PluginOnly,
}

impl fmt::Display for TagStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TagStrategy::CurrentCommit => "current-commit",
            TagStrategy::PluginOnly => "plugin-only",
        })
    }
}

impl FromStr for TagStrategy {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "current-commit" => Ok(TagStrategy::CurrentCommit),
            "plugin-only" => Ok(TagStrategy::PluginOnly),
            other => Err(PublishError::InvalidStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub remote: String,
    pub force: bool,
    pub strategy: TagStrategy,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            force: false,
            strategy: TagStrategy::default(),
        }
    }
}

/// `<pkgName>-<version>`
pub fn release_tag(artifact: &PackagedArtifact) -> String {
    format!("{}-{}", sanitize_name(&artifact.name), artifact.version)
}

/// Markdown body for the release page
pub fn release_notes(artifact: &PackagedArtifact) -> String {
    let file = artifact.file_name();
    let slug = sanitize_name(&artifact.name);
    let install = match artifact.format {
        ArchiveFormat::Zip => format!("unzip {} -d <plugins-dir>/{}", file, slug),
        ArchiveFormat::TarGz => format!("tar -xzf {} -C <plugins-dir>", file),
    };

    let mut notes = format!("# {} v{}\n\n", artifact.name, artifact.version);
    if let Some(description) = artifact.manifest.description() {
        notes.push_str(description);
        notes.push_str("\n\n");
    }
    notes.push_str(&format!(
        "## Installation\n\nDownload `{file}` and extract it into the launcher plugins directory:\n\n```sh\n{install}\n```\n\n"
    ));
    notes.push_str(&format!(
        "## Package\n\n| | |\n|---|---|\n| File | `{}` |\n| Size | {} |\n| SHA-256 | `{}` |\n",
        file,
        human_size(artifact.size_bytes),
        artifact.checksum
    ));
    notes
}

pub struct ReleasePublisher<R, S> {
    runner: R,
    git: String,
    store: S,
    options: ReleaseOptions,
}

impl<R: CommandRunner, S: ReleaseStore> ReleasePublisher<R, S> {
    pub fn new(runner: R, git: impl Into<String>, store: S, options: ReleaseOptions) -> Self {
        Self {
            runner,
            git: git.into(),
            store,
            options,
        }
    }

    /// git commands run inside the plugin directory so they resolve its repository
    fn git<I, S2>(&self, artifact: &PackagedArtifact, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S2>,
        S2: Into<String>,
    {
        CommandSpec::new(self.git.as_str())
            .args(args)
            .cwd(&artifact.source_dir)
    }

    fn git_stdout<I, S2>(&self, artifact: &PackagedArtifact, args: I) -> Result<String, PublishError>
    where
        I: IntoIterator<Item = S2>,
        S2: Into<String>,
    {
        let output = self.runner.run_checked(&self.git(artifact, args))?;
        Ok(output.stdout.trim().to_string())
    }

    fn remote_tag_exists(&self, artifact: &PackagedArtifact, tag: &str) -> Result<bool, PublishError> {
        let refname = format!("refs/tags/{}", tag);
        let stdout = self.git_stdout(
            artifact,
            ["ls-remote", "--tags", self.options.remote.as_str(), refname.as_str()],
        )?;
        Ok(!stdout.is_empty())
    }

    fn remove_existing(&self, artifact: &PackagedArtifact, tag: &str) -> Result<(), PublishError> {
        if self.store.release_exists(tag)? {
            self.store.delete_release(tag)?;
        }

        let delete_remote = format!(":refs/tags/{}", tag);
        let spec = self.git(artifact, ["push", self.options.remote.as_str(), delete_remote.as_str()]);
        if !self.runner.run(&spec)?.success() {
            debug!("Remote tag {} was not present", tag);
        }

        let spec = self.git(artifact, ["tag", "-d", tag]);
        if !self.runner.run(&spec)?.success() {
            debug!("Local tag {} was not present", tag);
        }
        Ok(())
    }

    /// A tag left behind by an aborted run would make `git tag -a` fail
    fn drop_local_tag(&self, artifact: &PackagedArtifact, tag: &str) -> Result<(), PublishError> {
        let refname = format!("refs/tags/{}", tag);
        let spec = self.git(artifact, ["rev-parse", "-q", "--verify", refname.as_str()]);
        if self.runner.run(&spec)?.success() {
            debug!("Deleting leftover local tag {}", tag);
            self.git_stdout(artifact, ["tag", "-d", tag])?;
        }
        Ok(())
    }

    fn create_tag(&self, artifact: &PackagedArtifact, tag: &str) -> Result<(), PublishError> {
        let message = format!("Release {} {}", artifact.name, artifact.version);
        match self.options.strategy {
            TagStrategy::CurrentCommit => {
                self.git_stdout(artifact, ["tag", "-a", tag, "-m", message.as_str()])?;
            }
            TagStrategy::PluginOnly => {
                let prefix = self.git_stdout(artifact, ["rev-parse", "--show-prefix"])?;
                let object = format!("HEAD:{}", prefix.trim_end_matches('/'));
                let tree = self.git_stdout(artifact, ["rev-parse", object.as_str()])?;
                let commit =
                    self.git_stdout(artifact, ["commit-tree", tree.as_str(), "-m", message.as_str()])?;
                debug!("Orphan commit {} for {}", commit, tag);
                self.git_stdout(
                    artifact,
                    ["tag", "-a", tag, commit.as_str(), "-m", message.as_str()],
                )?;
            }
        }
        Ok(())
    }

    /// Run the release protocol for one artifact
    pub fn publish_one(
        &self,
        artifact: &PackagedArtifact,
        summary: &mut PublishSummary,
    ) -> Result<(), PublishError> {
        let tag = release_tag(artifact);

        let exists =
            self.remote_tag_exists(artifact, &tag)? || self.store.release_exists(&tag)?;
        if exists {
            if !self.options.force {
                forge_logger::info(&format!("Release {} already exists, skipping", tag));
                summary.skipped.push(tag);
                return Ok(());
            }
            forge_logger::warn(&format!("Release {} exists, recreating (force)", tag));
            self.remove_existing(artifact, &tag)?;
        }

        self.drop_local_tag(artifact, &tag)?;
        self.create_tag(artifact, &tag)?;
        let refspec = format!("refs/tags/{}", tag);
        self.git_stdout(artifact, ["push", self.options.remote.as_str(), refspec.as_str()])?;

        let title = format!("{} v{}", artifact.name, artifact.version);
        let assets = [artifact.archive_path.clone(), artifact.checksum_path.clone()];
        self.store
            .create_release(&tag, &title, &release_notes(artifact), &assets)?;

        info!("Created release {} ({})", tag, self.options.strategy);
        forge_logger::success(&format!("Released {}", tag));
        summary.pushed.push(tag);
        Ok(())
    }

    /// Publish every artifact, stopping at the first failure
    pub fn publish(&self, artifacts: &[PackagedArtifact]) -> Result<PublishSummary, PublishError> {
        let mut summary = PublishSummary::default();
        for artifact in artifacts {
            if let Err(e) = self.publish_one(artifact, &mut summary) {
                warn!("Aborting release run at {}", artifact.file_name());
                return Err(PublishError::for_artifact(&artifact.file_name(), e));
            }
        }
        Ok(summary)
    }
}
