//! Publishing the generated site to a docs branch
//!
//! The site directory becomes the work tree of a throwaway repository whose
//! single orphan commit is force-pushed to the branch, GitHub Pages style.

use crate::DocGenError;
use forge_package::{CommandRunner, CommandSpec};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::info;

const COMMIT_NAME: &str = "plugin-forge";
const COMMIT_EMAIL: &str = "plugin-forge@users.noreply.github.com";

#[derive(Debug, Clone)]
pub struct DocsBranchOptions {
    pub git: String,
    pub branch: String,
    /// Remote name or URL; names are resolved from the current repository
    pub remote: String,
    pub message: String,
}

impl Default for DocsBranchOptions {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            branch: "gh-pages".to_string(),
            remote: "origin".to_string(),
            message: "Update plugin documentation".to_string(),
        }
    }
}

fn is_url(remote: &str) -> bool {
    remote.contains("://") || remote.contains('@') || Path::new(remote).is_absolute()
}

/// Force-push `site_dir` as the only commit of `options.branch`
pub fn publish_docs_branch<R: CommandRunner>(
    runner: &R,
    site_dir: &Path,
    options: &DocsBranchOptions,
) -> Result<(), DocGenError> {
    let url = if is_url(&options.remote) {
        options.remote.clone()
    } else {
        let spec = CommandSpec::new(options.git.as_str())
            .args(["remote", "get-url", options.remote.as_str()]);
        runner.run_checked(&spec)?.stdout.trim().to_string()
    };

    // served as-is, without Jekyll processing
    let marker = site_dir.join(".nojekyll");
    fs::write(&marker, "").map_err(|e| DocGenError::io(&marker, e))?;

    let scratch = TempDir::new().map_err(DocGenError::Scratch)?;
    let repo = scratch.path().join("repo");
    let git_dir = repo.join(".git");
    let git = |args: &[&str]| {
        CommandSpec::new(options.git.as_str())
            .arg("--git-dir")
            .arg(git_dir.display().to_string())
            .arg("--work-tree")
            .arg(site_dir.display().to_string())
            .arg("-c")
            .arg(format!("user.name={}", COMMIT_NAME))
            .arg("-c")
            .arg(format!("user.email={}", COMMIT_EMAIL))
            .args(args.iter().copied())
    };

    let init = CommandSpec::new(options.git.as_str())
        .args(["init", "--quiet"])
        .arg(repo.display().to_string());
    runner.run_checked(&init)?;

    let head = format!("refs/heads/{}", options.branch);
    runner.run_checked(&git(&["symbolic-ref", "HEAD", head.as_str()]))?;
    runner.run_checked(&git(&["add", "--all", "."]))?;
    runner.run_checked(&git(&["commit", "--quiet", "-m", options.message.as_str()]))?;

    let refspec = format!("HEAD:{}", head);
    runner.run_checked(&git(&["push", "--force", url.as_str(), refspec.as_str()]))?;

    info!("Pushed documentation to {} ({})", options.branch, options.remote);
    forge_logger::success(&format!("Published docs to branch {}", options.branch));
    Ok(())
}
