//! OCI registry publishing through the `oras` CLI
//!
//! Each archive is pushed as a single layer to `<registry>/<name>:<version>`
//! and then tagged `latest`. Login and logout bracket the whole batch.

use crate::summary::{PublishError, PublishSummary};
use forge_manifest::sanitize_name;
use forge_package::{CommandRunner, CommandSpec, PackagedArtifact, ProcessError};
use tracing::{debug, info, warn};

pub const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
const ANNOTATION_VERSION: &str = "org.opencontainers.image.version";
const ANNOTATION_DESCRIPTION: &str = "org.opencontainers.image.description";

#[derive(Debug, Clone)]
pub struct OciCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct OciOptions {
    /// e.g. `ghcr.io/acme/plugins`
    pub registry: String,
    pub credentials: Option<OciCredentials>,
    pub force: bool,
}

impl OciOptions {
    /// Host part of the registry, used for login
    pub fn registry_host(&self) -> &str {
        let registry = self.registry.trim_end_matches('/');
        registry.split('/').next().unwrap_or(registry)
    }
}

pub struct OciPublisher<R> {
    runner: R,
    oras: String,
    options: OciOptions,
}

impl<R: CommandRunner> OciPublisher<R> {
    pub fn new(runner: R, oras: impl Into<String>, options: OciOptions) -> Self {
        Self {
            runner,
            oras: oras.into(),
            options,
        }
    }

    fn oras(&self) -> CommandSpec {
        CommandSpec::new(self.oras.as_str())
    }

    /// `<registry>/<sanitized command or package name>`
    pub fn repository(&self, artifact: &PackagedArtifact) -> String {
        let manifest = &artifact.manifest;
        let name = manifest
            .first_command()
            .map(|c| c.name.as_str())
            .filter(|n| !n.trim().is_empty())
            .or_else(|| manifest.name())
            .unwrap_or(&artifact.name);
        format!(
            "{}/{}",
            self.options.registry.trim_end_matches('/'),
            sanitize_name(name)
        )
    }

    fn login(&self) -> Result<(), PublishError> {
        let Some(credentials) = &self.options.credentials else {
            debug!("No registry credentials given, relying on existing login");
            return Ok(());
        };
        let host = self.options.registry_host();
        let spec = self
            .oras()
            .args(["login", host, "--username", credentials.username.as_str()])
            .arg("--password-stdin")
            .stdin(credentials.password.as_str());
        self.runner
            .run_checked(&spec)
            .map_err(|source| PublishError::Login {
                registry: host.to_string(),
                source,
            })?;
        info!("Logged in to {}", host);
        Ok(())
    }

    fn logout(&self) {
        if self.options.credentials.is_none() {
            return;
        }
        let spec = self
            .oras()
            .args(["logout", self.options.registry_host()]);
        if let Err(e) = self.runner.run_checked(&spec) {
            warn!("Registry logout failed: {}", e);
        }
    }

    /// Whether `<reference>` resolves in the registry. A non-zero exit means absent.
    fn exists(&self, reference: &str) -> Result<bool, ProcessError> {
        let spec = self.oras().args(["manifest", "fetch", reference]);
        Ok(self.runner.run(&spec)?.success())
    }

    fn push(&self, artifact: &PackagedArtifact, reference: &str) -> Result<(), ProcessError> {
        let file_name = artifact.file_name();
        let mut spec = self
            .oras()
            .args(["push", reference])
            .arg(format!("{}:{}", file_name, LAYER_MEDIA_TYPE))
            .args([
                "--annotation".to_string(),
                format!("{}={}", ANNOTATION_TITLE, artifact.name),
                "--annotation".to_string(),
                format!("{}={}", ANNOTATION_VERSION, artifact.version),
            ]);
        if let Some(description) = artifact.manifest.description() {
            spec = spec
                .arg("--annotation")
                .arg(format!("{}={}", ANNOTATION_DESCRIPTION, description));
        }
        // oras rejects absolute paths, so push from the archive's directory
        if let Some(parent) = artifact.archive_path.parent() {
            spec = spec.cwd(parent);
        }
        self.runner.run_checked(&spec)?;
        Ok(())
    }

    /// Run the push protocol for one artifact
    pub fn publish_one(
        &self,
        artifact: &PackagedArtifact,
        summary: &mut PublishSummary,
    ) -> Result<(), PublishError> {
        let repository = self.repository(artifact);
        let reference = format!("{}:{}", repository, artifact.version);

        if self.exists(&reference)? {
            if !self.options.force {
                forge_logger::info(&format!("{} already exists, skipping", reference));
                summary.skipped.push(reference);
                return Ok(());
            }
            forge_logger::warn(&format!("{} exists, replacing (force)", reference));
            let delete = self
                .oras()
                .args(["manifest", "delete", "--force", reference.as_str()]);
            self.runner.run_checked(&delete)?;
        }

        forge_logger::spinner_start(&format!("Pushing {}", reference));
        if let Err(e) = self.push(artifact, &reference) {
            forge_logger::spinner_error(&format!("Push of {} failed", reference));
            return Err(e.into());
        }
        let tag = self
            .oras()
            .args(["tag", reference.as_str(), "latest"]);
        self.runner.run_checked(&tag)?;
        forge_logger::spinner_success(&format!("Pushed {}", reference));

        summary.pushed.push(reference);
        Ok(())
    }

    /// Publish every artifact, stopping at the first failure.
    /// Logout runs whether or not the batch succeeded.
    pub fn publish(&self, artifacts: &[PackagedArtifact]) -> Result<PublishSummary, PublishError> {
        self.login()?;

        let mut summary = PublishSummary::default();
        let result = artifacts.iter().try_for_each(|artifact| {
            self.publish_one(artifact, &mut summary)
                .map_err(|e| PublishError::for_artifact(&artifact.file_name(), e))
        });

        self.logout();
        result.map(|()| summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{demo_artifact, FakeRunner};
    use tempfile::TempDir;

    fn options(force: bool) -> OciOptions {
        OciOptions {
            registry: "ghcr.io/acme/plugins/".to_string(),
            credentials: None,
            force,
        }
    }

    #[test]
    fn test_repository_uses_sanitized_command_name() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let artifact = demo_artifact(temp_dir.path());
        let publisher = OciPublisher::new(FakeRunner::default(), "oras", options(false));
        assert_eq!(publisher.repository(&artifact), "ghcr.io/acme/plugins/demo");
        assert_eq!(options(false).registry_host(), "ghcr.io");
    }

    #[test]
    fn test_second_publish_is_skipped() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let artifacts = vec![demo_artifact(temp_dir.path())];
        let runner = FakeRunner::default();
        let publisher = OciPublisher::new(&runner, "oras", options(false));

        let Ok(first) = publisher.publish(&artifacts) else {
            panic!("first publish should succeed");
        };
        assert_eq!(first.pushed_count(), 1);
        assert_eq!(first.skipped_count(), 0);

        let Ok(second) = publisher.publish(&artifacts) else {
            panic!("second publish should succeed");
        };
        assert_eq!(second.pushed_count(), 0);
        assert_eq!(second.skipped_count(), 1);
        assert_eq!(runner.count_starting_with("oras push"), 1);
        assert!(runner
            .oci_refs
            .borrow()
            .contains("ghcr.io/acme/plugins/demo:latest"));
    }

    #[test]
    fn test_push_command_carries_media_type_and_annotations() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let artifacts = vec![demo_artifact(temp_dir.path())];
        let runner = FakeRunner::default();
        let publisher = OciPublisher::new(&runner, "oras", options(false));
        assert!(publisher.publish(&artifacts).is_ok());

        let calls = runner.calls.borrow();
        let Some(push) = calls.iter().find(|c| c.args.first().is_some_and(|a| a == "push")) else {
            panic!("push should have run");
        };
        assert_eq!(push.args[1], "ghcr.io/acme/plugins/demo:1.0.0");
        assert_eq!(
            push.args[2],
            "demo-1.0.0.tar.gz:application/vnd.oci.image.layer.v1.tar+gzip"
        );
        assert!(push
            .args
            .contains(&"org.opencontainers.image.version=1.0.0".to_string()));
        assert!(push
            .args
            .contains(&"org.opencontainers.image.description=Say hello".to_string()));
        assert_eq!(push.cwd.as_deref(), Some(temp_dir.path()));
    }

    #[test]
    fn test_force_deletes_then_pushes() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let artifacts = vec![demo_artifact(temp_dir.path())];
        let runner = FakeRunner::default();
        runner
            .oci_refs
            .borrow_mut()
            .insert("ghcr.io/acme/plugins/demo:1.0.0".to_string());

        let publisher = OciPublisher::new(&runner, "oras", options(true));
        let result = publisher.publish(&artifacts);
        assert!(result.is_ok_and(|s| s.pushed_count() == 1 && s.skipped_count() == 0));
        assert_eq!(runner.count_starting_with("oras manifest delete"), 1);
    }

    #[test]
    fn test_logout_runs_after_failure() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let artifacts = vec![demo_artifact(temp_dir.path())];
        let runner = FakeRunner::failing_on("oras push");
        let mut opts = options(false);
        opts.credentials = Some(OciCredentials {
            username: "bot".to_string(),
            password: "secret".to_string(),
        });

        let publisher = OciPublisher::new(&runner, "oras", opts);
        let result = publisher.publish(&artifacts);
        assert!(matches!(result, Err(PublishError::Artifact { .. })));

        let commands = runner.commands();
        assert!(commands[0].starts_with("oras login ghcr.io"));
        assert!(!commands[0].contains("secret"));
        assert_eq!(commands.last().map(String::as_str), Some("oras logout ghcr.io"));
        assert_eq!(runner.count_starting_with("oras tag"), 0);
    }
}
