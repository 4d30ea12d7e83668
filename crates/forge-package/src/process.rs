//! External process execution
//!
//! Publishing drives `git`, `gh` and `oras`. All of it goes through
//! [`CommandRunner`] so the protocols can be exercised against a fake.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command} (exit {status:?}): {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// A fully described invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Program name without directories, as used in logs and fakes
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    /// Human readable command line
    pub fn display(&self) -> String {
        let mut line = self.program_name().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait CommandRunner {
    /// Run to completion. A non-zero exit is an `Ok` output, not an error.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;

    /// Run and turn a non-zero exit into [`ProcessError::Failed`]
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let output = self.run(spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProcessError::Failed {
                command: spec.display(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        (**self).run(spec)
    }
}

/// Runs commands on the host with `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let shown = spec.display();
        debug!("Running: {}", shown);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let spawn_err = |source| ProcessError::Spawn {
            command: shown.clone(),
            source,
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        if let Some(input) = &spec.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).map_err(spawn_err)?;
            }
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        forge_logger::capture_output(&shown, result.status, &result.stdout, &result.stderr);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        calls: RefCell<Vec<String>>,
        status: i32,
    }

    impl CommandRunner for Scripted {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
            self.calls.borrow_mut().push(spec.display());
            Ok(CommandOutput {
                status: Some(self.status),
                stdout: String::new(),
                stderr: "boom\n".to_string(),
            })
        }
    }

    #[test]
    fn test_spec_display_strips_directories() {
        let spec = CommandSpec::new("/usr/local/bin/oras").args(["tag", "ref:1.0.0", "latest"]);
        assert_eq!(spec.program_name(), "oras");
        assert_eq!(spec.display(), "oras tag ref:1.0.0 latest");
    }

    #[test]
    fn test_run_checked_maps_failure() {
        let runner = Scripted {
            calls: RefCell::new(Vec::new()),
            status: 2,
        };
        let result = runner.run_checked(&CommandSpec::new("git").arg("push"));
        match result {
            Err(ProcessError::Failed {
                command,
                status,
                stderr,
            }) => {
                assert_eq!(command, "git push");
                assert_eq!(status, Some(2));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn test_run_checked_passes_success() {
        let runner = Scripted {
            calls: RefCell::new(Vec::new()),
            status: 0,
        };
        assert!(runner.run_checked(&CommandSpec::new("git")).is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_captures_output_and_stdin() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "cat; echo err >&2; exit 3"])
            .stdin("hello");
        let Ok(output) = SystemRunner.run(&spec) else {
            return;
        };
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_system_runner_spawn_failure() {
        let spec = CommandSpec::new("/definitely/not/a/real/binary-12345");
        assert!(matches!(
            SystemRunner.run(&spec),
            Err(ProcessError::Spawn { .. })
        ));
    }
}
