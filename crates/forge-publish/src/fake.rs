//! In-memory stand-in for `git` and `oras`

use forge_package::{CommandOutput, CommandRunner, CommandSpec, ProcessError};
use std::cell::RefCell;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct FakeRunner {
    pub calls: RefCell<Vec<CommandSpec>>,
    /// `oras` references (`repo:tag`) present in the fake registry
    pub oci_refs: RefCell<BTreeSet<String>>,
    /// Tags present on the fake remote
    pub remote_tags: RefCell<BTreeSet<String>>,
    /// Tags present in the fake local repository
    pub local_tags: RefCell<BTreeSet<String>>,
    /// Any command whose display contains this string exits 1
    pub fail_on: Option<String>,
}

impl FakeRunner {
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(CommandSpec::display).collect()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.commands().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn exit(status: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn oras(&self, args: &[&str]) -> CommandOutput {
        match args {
            ["manifest", "fetch", reference, ..] => {
                if self.oci_refs.borrow().contains(*reference) {
                    Self::ok("{}")
                } else {
                    Self::exit(1, "not found")
                }
            }
            ["manifest", "delete", "--force", reference] => {
                self.oci_refs.borrow_mut().remove(*reference);
                Self::ok("")
            }
            ["push", reference, ..] => {
                self.oci_refs.borrow_mut().insert((*reference).to_string());
                Self::ok("")
            }
            ["tag", reference, tag] => {
                let repo = reference.rsplit_once(':').map_or(*reference, |(r, _)| r);
                self.oci_refs.borrow_mut().insert(format!("{}:{}", repo, tag));
                Self::ok("")
            }
            _ => Self::ok(""),
        }
    }

    fn git(&self, args: &[&str]) -> CommandOutput {
        match args {
            ["ls-remote", "--tags", _, refname] => {
                let tag = refname.trim_start_matches("refs/tags/");
                if self.remote_tags.borrow().contains(tag) {
                    Self::ok(&format!("abc123\t{}\n", refname))
                } else {
                    Self::ok("")
                }
            }
            ["push", _, refspec] => {
                if let Some(tag) = refspec.strip_prefix(":refs/tags/") {
                    self.remote_tags.borrow_mut().remove(tag);
                } else if let Some(tag) = refspec.strip_prefix("refs/tags/") {
                    self.remote_tags.borrow_mut().insert(tag.to_string());
                }
                Self::ok("")
            }
            ["tag", "-a", tag, ..] => {
                if self.local_tags.borrow_mut().insert((*tag).to_string()) {
                    Self::ok("")
                } else {
                    Self::exit(128, &format!("fatal: tag '{}' already exists", tag))
                }
            }
            ["tag", "-d", tag] => {
                if self.local_tags.borrow_mut().remove(*tag) {
                    Self::ok(&format!("Deleted tag '{}'\n", tag))
                } else {
                    Self::exit(1, &format!("error: tag '{}' not found.", tag))
                }
            }
            ["rev-parse", "-q", "--verify", refname] => {
                let tag = refname.trim_start_matches("refs/tags/");
                if self.local_tags.borrow().contains(tag) {
                    Self::ok("abc123\n")
                } else {
                    Self::exit(1, "")
                }
            }
            ["rev-parse", "--show-prefix"] => Self::ok("plugins/demo/\n"),
            ["rev-parse", object] if object.starts_with("HEAD:") => Self::ok("tree0001\n"),
            ["commit-tree", ..] => Self::ok("commit0001\n"),
            _ => Self::ok(""),
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        self.calls.borrow_mut().push(spec.clone());

        if let Some(pattern) = &self.fail_on {
            if spec.display().contains(pattern.as_str()) {
                return Ok(Self::exit(1, "simulated failure"));
            }
        }

        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        Ok(match spec.program_name() {
            "oras" => self.oras(&args),
            "git" => self.git(&args),
            _ => Self::ok(""),
        })
    }
}

/// A packaged `demo` 1.0.0 artifact backed by real files under `dir`
pub fn demo_artifact(dir: &std::path::Path) -> forge_package::PackagedArtifact {
    use forge_manifest::{parse_manifest, ArchiveFormat, ManifestFormat};

    let manifest = parse_manifest(
        r#"{"pkgName": "demo", "version": "1.0.0",
            "cmds": [{"name": "demo", "type": "executable", "executable": "bin/demo",
                      "short": "Say hello"}]}"#,
        ManifestFormat::Json,
    )
    .unwrap_or_default();

    let archive_path = dir.join("demo-1.0.0.tar.gz");
    let checksum_path = dir.join("demo-1.0.0.tar.gz.sha256");
    let _ = std::fs::write(&archive_path, b"archive");
    let _ = std::fs::write(&checksum_path, "00  demo-1.0.0.tar.gz\n");

    forge_package::PackagedArtifact {
        name: "demo".to_string(),
        version: "1.0.0".to_string(),
        archive_path,
        checksum: "0".repeat(64),
        size_bytes: 7,
        file_count: 2,
        format: ArchiveFormat::TarGz,
        checksum_path,
        manifest,
        source_dir: dir.to_path_buf(),
    }
}
