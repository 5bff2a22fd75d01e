//! npm dist-tag reconciliation for conveyor.
//!
//! Every release branch publishes under a dist tag named after the branch (or
//! its channel). Once the branch is gone the tag lingers in the registry. The
//! [`reconcile`] function decides which tags are stale by matching the live
//! branches against the release-branch configuration; [`prune_dist_tags`]
//! removes them one by one, tolerating individual failures.
//!
//! # Example
//!
//! ```
//! use conveyor_registry::reconcile;
//! use conveyor_types::BranchReleaseEntry;
//!
//! let config = vec![BranchReleaseEntry::from("main"), BranchReleaseEntry::from("+([0-9]).x")];
//! let branches = vec!["main".to_string(), "5.x".to_string()];
//! let tags = vec!["latest".to_string(), "5.x".to_string(), "4.x".to_string()];
//! let ignore = vec!["latest".to_string()];
//!
//! let stale = reconcile(&config, &branches, &tags, &ignore).expect("patterns compile");
//! assert_eq!(stale, vec!["4.x"]);
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use conveyor_glob::{Glob, GlobError};
use conveyor_process::CommandRunner;
use conveyor_types::BranchReleaseEntry;
use serde::{Deserialize, Serialize};

/// npm user config file, relative to the home directory.
pub const NPMRC_FILE: &str = ".npmrc";

/// Registry the auth token is scoped to.
pub const NPM_REGISTRY_SCOPE: &str = "//registry.npmjs.org/";

/// Compute the dist tags that should be deleted.
///
/// A live branch that matches an entry of `branch_config` claims its own name
/// and the entry's channel, if any. A live tag is stale when nothing claims it
/// and it is not listed in `ignore`. Output preserves the order of
/// `live_dist_tags` without duplicates.
pub fn reconcile(
    branch_config: &[BranchReleaseEntry],
    live_branches: &[String],
    live_dist_tags: &[String],
    ignore: &[String],
) -> Result<Vec<String>, GlobError> {
    let claimed = claimed_tags(branch_config, live_branches)?;

    let mut stale: Vec<String> = Vec::new();
    for tag in live_dist_tags {
        if claimed.contains(tag) || ignore.contains(tag) || stale.contains(tag) {
            continue;
        }
        stale.push(tag.clone());
    }
    Ok(stale)
}

/// Tags claimed by live branches under `branch_config`.
pub fn claimed_tags(
    branch_config: &[BranchReleaseEntry],
    live_branches: &[String],
) -> Result<BTreeSet<String>, GlobError> {
    let entries = branch_config
        .iter()
        .map(|entry| Ok((Glob::new(entry.pattern())?, entry.channel())))
        .collect::<Result<Vec<_>, GlobError>>()?;

    let mut claimed = BTreeSet::new();
    for branch in live_branches {
        for (glob, channel) in &entries {
            if !glob.is_match(branch) {
                continue;
            }
            claimed.insert(branch.clone());
            if let Some(channel) = channel {
                claimed.insert((*channel).to_string());
            }
        }
    }
    Ok(claimed)
}

/// Location of the npm user config.
///
/// `home` overrides the platform home directory.
pub fn npmrc_path(home: Option<&Path>) -> Result<PathBuf> {
    let home = match home {
        Some(path) => path.to_path_buf(),
        None => dirs::home_dir().context("could not determine home directory for .npmrc")?,
    };
    Ok(home.join(NPMRC_FILE))
}

/// Persist `token` as the registry auth token in the npmrc at `path`.
///
/// Other lines of an existing file are kept; a previous token line for the
/// same registry is replaced.
pub fn write_npm_token(path: &Path, token: &str) -> Result<()> {
    let prefix = format!("{NPM_REGISTRY_SCOPE}:_authToken=");
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let mut lines: Vec<&str> = existing
        .lines()
        .filter(|line| !line.trim_start().starts_with(&prefix))
        .collect();
    let token_line = format!("{prefix}{token}");
    lines.push(&token_line);
    let mut content = lines.join("\n");
    content.push('\n');

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

/// `npm dist-tag` driven through a [`CommandRunner`].
pub struct NpmDistTags<'r> {
    runner: &'r mut dyn CommandRunner,
}

impl<'r> NpmDistTags<'r> {
    pub fn new(runner: &'r mut dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Tags currently published for `package`.
    pub fn list(&mut self, package: &str) -> Result<Vec<String>> {
        let result = self
            .runner
            .run("npm", &["dist-tag", "ls", package])
            .with_context(|| format!("failed to list dist tags of {package}"))?;
        result
            .ok()
            .with_context(|| format!("failed to list dist tags of {package}"))?;
        Ok(parse_dist_tag_ls(&result.stdout))
    }

    pub fn remove(&mut self, package: &str, tag: &str) -> Result<()> {
        let result = self
            .runner
            .run("npm", &["dist-tag", "rm", package, tag])
            .with_context(|| format!("failed to remove dist tag {tag} of {package}"))?;
        result
            .ok()
            .with_context(|| format!("failed to remove dist tag {tag} of {package}"))?;
        Ok(())
    }
}

// `npm dist-tag ls` prints `tag: version`; bare tag names are accepted too
fn parse_dist_tag_ls(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.split_once(':').map_or(line, |(tag, _)| tag).trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Outcome of a pruning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    /// `(tag, error)` for each deletion that failed.
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remove each of `stale` from `package`, sequentially.
///
/// A failed deletion is recorded and the remaining tags are still attempted.
pub fn prune_dist_tags(client: &mut NpmDistTags<'_>, package: &str, stale: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for tag in stale {
        match client.remove(package, tag) {
            Ok(()) => {
                tracing::debug!(package, tag = tag.as_str(), "removed dist tag");
                report.deleted.push(tag.clone());
            }
            Err(err) => {
                tracing::warn!(package, tag = tag.as_str(), error = %format!("{err:#}"), "failed to remove dist tag");
                report.failed.push((tag.clone(), format!("{err:#}")));
            }
        }
    }
    report
}
