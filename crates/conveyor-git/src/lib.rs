//! Git queries for conveyor.
//!
//! The resolver needs two facts from version control: the message of the
//! commit being built (for skip directives) and the set of branches that
//! still exist on the remote (for dist-tag reconciliation). Both are read by
//! shelling out to `git`; set `CONVEYOR_GIT_BIN` to use a different binary.
//!
//! # Example
//!
//! ```no_run
//! use conveyor_git::{GitCli, Vcs};
//!
//! let git = GitCli::new(".");
//! let message = git.last_commit_message().unwrap_or_default();
//! println!("building: {message}");
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Environment variable overriding the git program.
pub const GIT_BIN_ENV: &str = "CONVEYOR_GIT_BIN";

/// Version-control queries the pipeline depends on.
pub trait Vcs {
    /// Full message of the most recent commit.
    fn last_commit_message(&self) -> Result<String>;
    /// Branch names currently present on the remote.
    fn live_branches(&self) -> Result<Vec<String>>;
}

/// [`Vcs`] backed by the git command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
    remote: String,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            remote: "origin".to_string(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }
}

impl Vcs for GitCli {
    fn last_commit_message(&self) -> Result<String> {
        last_commit_message(&self.repo_root)
    }

    fn live_branches(&self) -> Result<Vec<String>> {
        list_remote_branches(&self.repo_root, &self.remote)
    }
}

/// Message of `HEAD`, trailing whitespace trimmed.
pub fn last_commit_message(repo_root: &Path) -> Result<String> {
    let out = run_git(repo_root, &["log", "-1", "--format=%B"], "log")?;
    Ok(out.trim_end().to_string())
}

/// Branch heads advertised by `remote`.
pub fn list_remote_branches(repo_root: &Path, remote: &str) -> Result<Vec<String>> {
    let out = run_git(repo_root, &["ls-remote", "--heads", remote], "ls-remote")?;
    let branches = parse_ls_remote_heads(&out);
    tracing::debug!(remote, count = branches.len(), "listed remote branches");
    Ok(branches)
}

fn parse_ls_remote_heads(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter_map(|(_, refname)| refname.trim().strip_prefix("refs/heads/"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn run_git(repo_root: &Path, args: &[&str], what: &str) -> Result<String> {
    let out = Command::new(git_program())
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("failed to execute git {what}; is git installed?"))?;

    if !out.status.success() {
        bail!(
            "git {what} failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

fn git_program() -> String {
    env::var(GIT_BIN_ENV).unwrap_or_else(|_| "git".to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;

    #[cfg(not(windows))]
    fn write_fake_git(bin_dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = bin_dir.join("git");
        fs::write(
            &path,
            "#!/usr/bin/env sh\n\
             if [ \"$CONVEYOR_GIT_MODE\" = \"fail\" ]; then\n  echo 'fatal: mock failure' >&2\n  exit 1\nfi\n\
             if [ \"$1\" = \"log\" ]; then\n  printf 'build: commit msg [SKIP CI]\\n\\nbody line\\n\\n'\n  exit 0\nfi\n\
             if [ \"$1\" = \"ls-remote\" ]; then\n  printf 'aaa\\trefs/heads/main\\nbbb\\trefs/heads/5.x\\nccc\\trefs/heads/feature/x\\n'\n  exit 0\nfi\n\
             exit 2\n",
        )
        .expect("write fake git");
        let mut perms = fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[cfg(not(windows))]
    fn with_fake_git<R>(mode: &str, f: impl FnOnce(&Path) -> R) -> R {
        let td = tempdir().expect("tempdir");
        let bin = td.path().join("bin");
        fs::create_dir_all(&bin).expect("mkdir");
        let fake_git = write_fake_git(&bin);
        let program = fake_git.to_str().expect("utf8").to_string();

        temp_env::with_vars(
            [
                (GIT_BIN_ENV, Some(program.as_str())),
                ("CONVEYOR_GIT_MODE", Some(mode)),
            ],
            || f(td.path()),
        )
    }

    #[test]
    #[serial]
    #[cfg(not(windows))]
    fn last_commit_message_reads_head() {
        let message = with_fake_git("ok", |root| last_commit_message(root).expect("message"));
        assert_eq!(message, "build: commit msg [SKIP CI]\n\nbody line");
    }

    #[test]
    #[serial]
    #[cfg(not(windows))]
    fn remote_branches_are_parsed_from_ls_remote() {
        let branches = with_fake_git("ok", |root| GitCli::new(root).live_branches().expect("branches"));
        assert_eq!(branches, vec!["main", "5.x", "feature/x"]);
    }

    #[test]
    #[serial]
    #[cfg(not(windows))]
    fn git_failure_is_surfaced() {
        let err = with_fake_git("fail", |root| last_commit_message(root).expect_err("must fail"));
        let rendered = format!("{err:#}");
        assert!(rendered.contains("git log failed"), "{rendered}");
        assert!(rendered.contains("mock failure"), "{rendered}");
    }

    #[test]
    #[serial]
    fn missing_git_binary_is_an_error() {
        let td = tempdir().expect("tempdir");
        let missing = td.path().join("no-such-git");
        let err = temp_env::with_var(GIT_BIN_ENV, Some(missing.as_os_str()), || {
            last_commit_message(td.path()).expect_err("must fail")
        });
        assert!(format!("{err:#}").contains("failed to execute git log"));
    }

    #[test]
    fn ls_remote_parsing_ignores_noise() {
        let out = "abc\trefs/heads/main\nwarning: something\ndef\trefs/tags/v1\n\nfff\trefs/heads/canary\n";
        assert_eq!(parse_ls_remote_heads(out), vec!["main", "canary"]);
    }

    #[test]
    fn remote_defaults_to_origin() {
        let git = GitCli::new("/repo");
        assert_eq!(git.remote, "origin");
        assert_eq!(git.with_remote("upstream").remote, "upstream");
    }
}
