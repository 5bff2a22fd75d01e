//! Core domain types for conveyor.
//!
//! This crate holds the values that flow between the resolution engine and
//! the component actions: the runner context handed to every invocation,
//! the resolved [`Metadata`] record, commit-message [`SkipPattern`]s and the
//! release-branch entries consumed by dist-tag reconciliation.
//!
//! # Example
//!
//! ```
//! use conveyor_types::SkipPattern;
//!
//! let pattern = SkipPattern::default_ci();
//! assert!(pattern.is_match("chore: bump deps [CI SKIP]"));
//! assert!(!pattern.is_match("chore: skip cinema"));
//! ```

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Package name used when the manifest does not declare one.
pub const UNKNOWN_PACKAGE_NAME: &str = "<unknown>";

/// Default source of the skip-CI directive pattern.
pub const DEFAULT_CI_SKIP_SOURCE: &str = r"\[skip ci\]|\[ci skip\]";

/// Default source of the skip-CD directive pattern.
pub const DEFAULT_CD_SKIP_SOURCE: &str = r"\[skip cd\]|\[cd skip\]";

/// Events that carry a pull request.
const PULL_REQUEST_EVENTS: &[&str] = &["pull_request", "pull_request_target"];

/// Repository coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

/// Issue (or pull request) coordinates as reported by the runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    #[serde(default)]
    pub number: Option<u64>,
    pub owner: String,
    pub repo: String,
}

/// The slice of a pull request payload the resolver cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub draft: bool,
}

/// Webhook payload of the triggering event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequest>,
}

/// Runner-supplied description of the current pipeline invocation.
///
/// Read-only for the duration of a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerContext {
    pub action: String,
    pub actor: String,
    pub event_name: String,
    pub issue: IssueRef,
    pub job: String,
    #[serde(default)]
    pub payload: EventPayload,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repo: RepoRef,
    pub run_id: u64,
    pub run_number: u64,
    pub sha: String,
    pub workflow: String,
}

impl RunnerContext {
    /// Whether the triggering event is a pull-request event.
    pub fn is_pull_request_event(&self) -> bool {
        PULL_REQUEST_EVENTS.contains(&self.event_name.as_str())
    }

    /// Pull request carried by the payload, regardless of event kind.
    pub fn pull_request(&self) -> Option<&PullRequest> {
        self.payload.pull_request.as_ref()
    }

    /// Pull request number carried by the payload.
    pub fn pr_number(&self) -> Option<u64> {
        self.pull_request().and_then(|pr| pr.number)
    }
}

/// Identity used for release commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

/// Errors raised while compiling a [`SkipPattern`].
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("unsupported pattern flag `{0}`")]
    UnknownFlag(char),
    #[error("invalid pattern `{source_text}`: {error}")]
    Invalid {
        source_text: String,
        #[source]
        error: regex::Error,
    },
}

/// Serialized form of a [`SkipPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRegExp {
    pub source: String,
    #[serde(default)]
    pub flags: String,
}

/// A commit-message directive pattern.
///
/// Stored as a `source`/`flags` pair so it survives the metadata artifact
/// round trip, and compiled once on construction. Recognised flags are
/// `i` (case-insensitive), `m` (multi-line) and `s` (dot matches newline);
/// `g`, `u`, `y` and `d` are accepted and have no effect on matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "JsonRegExp", into = "JsonRegExp")]
pub struct SkipPattern {
    source: String,
    flags: String,
    compiled: Regex,
}

impl SkipPattern {
    pub fn new(source: &str, flags: &str) -> Result<Self, PatternError> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' | 'd' => {}
                other => return Err(PatternError::UnknownFlag(other)),
            }
        }

        let compiled = builder.build().map_err(|error| PatternError::Invalid {
            source_text: source.to_string(),
            error,
        })?;

        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            compiled,
        })
    }

    /// Case-insensitive `[skip ci]` / `[ci skip]`.
    pub fn default_ci() -> Self {
        Self::builtin(DEFAULT_CI_SKIP_SOURCE)
    }

    /// Case-insensitive `[skip cd]` / `[cd skip]`.
    pub fn default_cd() -> Self {
        Self::builtin(DEFAULT_CD_SKIP_SOURCE)
    }

    fn builtin(source: &str) -> Self {
        let compiled = RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|_| unreachable!("built-in directive pattern is valid"));
        Self {
            source: source.to_string(),
            flags: "i".to_string(),
            compiled,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl PartialEq for SkipPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for SkipPattern {}

impl fmt::Display for SkipPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl TryFrom<JsonRegExp> for SkipPattern {
    type Error = PatternError;

    fn try_from(value: JsonRegExp) -> Result<Self, Self::Error> {
        Self::new(&value.source, &value.flags)
    }
}

impl From<SkipPattern> for JsonRegExp {
    fn from(value: SkipPattern) -> Self {
        Self {
            source: value.source,
            flags: value.flags,
        }
    }
}

/// Prerelease marker of a structured release branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prerelease {
    Flag(bool),
    Identifier(String),
}

impl Prerelease {
    pub fn is_enabled(&self) -> bool {
        match self {
            Prerelease::Flag(flag) => *flag,
            Prerelease::Identifier(id) => !id.is_empty(),
        }
    }
}

/// Structured release-branch declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseBranch {
    /// Branch name or glob.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerelease: Option<Prerelease>,
}

/// One element of the release-branch configuration.
///
/// Plain strings may be literal branch names or extended globs such as
/// `+([0-9])?(.{+([0-9]),x}).x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchReleaseEntry {
    Pattern(String),
    Branch(ReleaseBranch),
}

impl BranchReleaseEntry {
    /// Name or glob the live branch is tested against.
    pub fn pattern(&self) -> &str {
        match self {
            BranchReleaseEntry::Pattern(pattern) => pattern,
            BranchReleaseEntry::Branch(branch) => &branch.name,
        }
    }

    /// Distribution channel claimed in addition to the branch name.
    pub fn channel(&self) -> Option<&str> {
        match self {
            BranchReleaseEntry::Pattern(_) => None,
            BranchReleaseEntry::Branch(branch) => branch.channel.as_deref(),
        }
    }
}

impl From<&str> for BranchReleaseEntry {
    fn from(value: &str) -> Self {
        BranchReleaseEntry::Pattern(value.to_string())
    }
}

/// The resolved pipeline record.
///
/// Produced once per invocation and consumed read-only by every component
/// action. Serializes with camelCase keys so a later stage can reload it
/// verbatim from the metadata artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub package_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,

    pub has_deploy: bool,
    pub has_docs: bool,
    pub has_externals: bool,
    pub has_integration_node: bool,
    pub has_integration_client: bool,
    pub has_integration_webpack: bool,
    pub has_integration_externals: bool,
    pub has_bin: bool,
    pub has_private: bool,

    pub should_skip_ci: bool,
    pub should_skip_cd: bool,

    pub can_release: bool,
    pub can_automerge: bool,
    pub can_retry_automerge: bool,
    pub can_upload_coverage: bool,

    pub release_actor_whitelist: Vec<String>,
    pub automerge_actor_whitelist: Vec<String>,
    pub release_repo_owner_whitelist: Vec<String>,
    pub npm_ignore_dist_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    pub commit_sha: String,
    pub current_branch: String,
    pub committer: Committer,

    pub artifact_retention_days: u32,
    pub retry_ceiling_seconds: u64,

    pub ci_skip_regex: SkipPattern,
    pub cd_skip_regex: SkipPattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_string: Option<String>,

    pub node_current_version: String,
    pub node_test_versions: Vec<String>,
    pub webpack_test_versions: Vec<String>,
    pub npm_audit_fail_level: String,

    pub release_branch_config: Vec<BranchReleaseEntry>,
}

/// Actions a workflow step can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentAction {
    AuditRuntime,
    CleanupNpm,
    Lint,
    MetadataCollect,
    MetadataDownload,
    TestIntegrationClient,
    TestIntegrationExternals,
    TestIntegrationNode,
    TestIntegrationWebpack,
    TestUnitThenBuild,
    VerifyRelease,
}

impl ComponentAction {
    pub const ALL: [ComponentAction; 11] = [
        ComponentAction::AuditRuntime,
        ComponentAction::CleanupNpm,
        ComponentAction::Lint,
        ComponentAction::MetadataCollect,
        ComponentAction::MetadataDownload,
        ComponentAction::TestIntegrationClient,
        ComponentAction::TestIntegrationExternals,
        ComponentAction::TestIntegrationNode,
        ComponentAction::TestIntegrationWebpack,
        ComponentAction::TestUnitThenBuild,
        ComponentAction::VerifyRelease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentAction::AuditRuntime => "audit-runtime",
            ComponentAction::CleanupNpm => "cleanup-npm",
            ComponentAction::Lint => "lint",
            ComponentAction::MetadataCollect => "metadata-collect",
            ComponentAction::MetadataDownload => "metadata-download",
            ComponentAction::TestIntegrationClient => "test-integration-client",
            ComponentAction::TestIntegrationExternals => "test-integration-externals",
            ComponentAction::TestIntegrationNode => "test-integration-node",
            ComponentAction::TestIntegrationWebpack => "test-integration-webpack",
            ComponentAction::TestUnitThenBuild => "test-unit-then-build",
            ComponentAction::VerifyRelease => "verify-release",
        }
    }
}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown component action: {s}"))
    }
}
