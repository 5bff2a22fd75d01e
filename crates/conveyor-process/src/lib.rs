//! Process execution for conveyor.
//!
//! Component actions are thin sequences of `npm`/`npx` invocations. They go
//! through the [`CommandRunner`] seam so the pipeline can be driven against a
//! recording runner in tests and against [`SystemRunner`] in CI.
//!
//! # Example
//!
//! ```no_run
//! use conveyor_process::{CommandRunner, SystemRunner};
//!
//! let mut runner = SystemRunner::new().in_dir("/tmp/checkout");
//! let result = runner.run("npm", &["--version"]).expect("spawn npm");
//! assert!(result.success);
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Result of a command execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command exited with status 0
    pub success: bool,
    /// Exit code, absent when killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandResult {
    /// Turn a non-zero exit into an error carrying stderr.
    pub fn ok(&self) -> Result<&Self> {
        if self.success {
            Ok(self)
        } else {
            Err(anyhow::anyhow!(
                "command failed with exit code {:?}: {}",
                self.exit_code,
                self.stderr.trim()
            ))
        }
    }

    pub fn from_output(output: &Output, duration: Duration) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Something that can run an external program to completion.
///
/// `Err` means the program could not be started at all; a program that ran
/// and failed comes back as `Ok` with `success == false`.
pub trait CommandRunner {
    fn run(&mut self, program: &str, args: &[&str]) -> Result<CommandResult>;
}

/// [`CommandRunner`] that spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable to every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, program: &str, args: &[&str]) -> Result<CommandResult> {
        let resolved = resolve_program(program);
        let start = Instant::now();

        let mut cmd = Command::new(&resolved);
        cmd.args(args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .with_context(|| format!("failed to run command: {program} {args:?}"))?;
        let result = CommandResult::from_output(&output, start.elapsed());

        tracing::debug!(
            program,
            ?args,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            "command finished"
        );
        Ok(result)
    }
}

/// Run a command in the current directory and capture its output.
pub fn run_command(program: &str, args: &[&str]) -> Result<CommandResult> {
    SystemRunner::new().run(program, args)
}

/// Run a command in `dir` and capture its output.
pub fn run_command_in_dir(program: &str, args: &[&str], dir: &Path) -> Result<CommandResult> {
    SystemRunner::new().in_dir(dir).run(program, args)
}

/// Check if a command exists in PATH
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

// npm ships as npm.cmd on Windows, which Command::new won't find by bare name
fn resolve_program(program: &str) -> PathBuf {
    which::which(program).unwrap_or_else(|_| PathBuf::from(program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn captures_stdout_and_exit_code() {
        let result = run_command("sh", &["-c", "echo hello; exit 0"]).expect("run");
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    #[cfg(unix)]
    fn non_zero_exit_is_not_a_spawn_error() {
        let result = run_command("sh", &["-c", "echo boom >&2; exit 3"]).expect("run");
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));

        let err = result.ok().expect_err("must fail");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_command("this-command-does-not-exist-xyz123", &[]).expect_err("must fail");
        assert!(err.to_string().contains("failed to run command"));
    }

    #[test]
    #[cfg(unix)]
    fn runs_in_configured_directory() {
        let td = tempfile::tempdir().expect("tempdir");
        std::fs::write(td.path().join("marker.txt"), "present").expect("write");

        let result = run_command_in_dir("sh", &["-c", "cat marker.txt"], td.path()).expect("run");
        assert_eq!(result.stdout, "present");
    }

    #[test]
    #[cfg(unix)]
    fn passes_configured_environment() {
        let mut runner = SystemRunner::new().with_env("CONVEYOR_PROCESS_TEST", "42");
        let result = runner
            .run("sh", &["-c", "printf %s \"$CONVEYOR_PROCESS_TEST\""])
            .expect("run");
        assert_eq!(result.stdout, "42");
    }

    #[test]
    fn builder_records_working_directory() {
        let runner = SystemRunner::new().in_dir("/srv/checkout");
        assert_eq!(runner.cwd(), Some(Path::new("/srv/checkout")));
        assert_eq!(SystemRunner::new().cwd(), None);
    }

    #[test]
    fn command_exists_nonexistent() {
        assert!(!command_exists("this-command-does-not-exist-xyz123"));
    }

    #[test]
    #[cfg(unix)]
    fn command_exists_sh() {
        assert!(command_exists("sh"));
    }

    #[test]
    fn command_result_serialization() {
        let result = CommandResult {
            success: true,
            exit_code: Some(0),
            stdout: "output".to_string(),
            stderr: String::new(),
            duration_ms: 150,
        };

        let json = serde_json::to_string(&result).expect("serialize");
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"stdout\":\"output\""));
    }
}
