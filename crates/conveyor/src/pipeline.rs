use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use conveyor_config::{ConfigLoader, ConfigSources, Fetcher, Loaded};
use conveyor_git::Vcs;
use conveyor_process::CommandRunner;
use conveyor_retry::Clock;
use conveyor_types::{Metadata, RunnerContext};

use crate::advisory::{self, Advisory};
use crate::artifact::{
    ArtifactStore, METADATA_ARTIFACT, METADATA_FILE, artifact_key, read_metadata, write_metadata,
};
use crate::authorize::authorize;
use crate::directive::Directives;
use crate::error::PipelineError;
use crate::merge::{base_metadata, merge, overlay_local};
use crate::options::{CloneOptions, InvokerOptions, NodeOption, NodeOptions, Provisioner, RepositoryOption};
use crate::reporter::Reporter;

/// Directory, relative to the repository root, for files staged for upload.
pub const DEFAULT_ARTIFACT_DIR: &str = ".conveyor";

/// Boundary implementations a pipeline drives.
pub struct Collaborators<'a> {
    pub vcs: &'a dyn Vcs,
    pub provisioner: &'a mut dyn Provisioner,
    pub artifacts: &'a mut dyn ArtifactStore,
    pub runner: &'a mut dyn CommandRunner,
    pub fetcher: &'a dyn Fetcher,
    pub clock: &'a dyn Clock,
}

/// Result of a metadata collection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub metadata: Metadata,
    /// Advisories issued during the pass, in order.
    pub advisories: Vec<Advisory>,
}

/// One pipeline invocation against a repository checkout.
pub struct Pipeline<'a> {
    pub(crate) collab: Collaborators<'a>,
    pub(crate) root: PathBuf,
    pub(crate) sources: ConfigSources,
    pub(crate) artifact_dir: PathBuf,
    pub(crate) home: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    /// Standard layout: fragments under `root`, global config at `global_config_url`.
    pub fn new(collaborators: Collaborators<'a>, root: impl Into<PathBuf>, global_config_url: &str) -> Self {
        let root = root.into();
        Self {
            sources: ConfigSources::for_root(&root, global_config_url),
            artifact_dir: root.join(DEFAULT_ARTIFACT_DIR),
            collab: collaborators,
            root,
            home: None,
        }
    }

    pub fn with_sources(mut self, sources: ConfigSources) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Home directory for npm credentials; defaults to the platform home.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the metadata for this invocation.
    pub fn collect(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Resolution> {
        let github_token = opts.require_github_token()?;
        let loader = ConfigLoader::new(self.collab.fetcher);

        reporter.info(&format!("loading global pipeline config from {}...", self.sources.global));
        let global = loader
            .global(&self.sources.global)
            .map_err(PipelineError::GlobalConfig)?;

        let message = self
            .collab
            .vcs
            .last_commit_message()
            .context("failed to read the last commit message")?;

        let mut advisories = Vec::new();
        let local = match loader.local(&self.sources.local).map_err(PipelineError::from)? {
            Loaded::Present(local) => Some(local),
            Loaded::Absent { resource } => {
                tracing::debug!(%resource, "local pipeline config absent");
                note(reporter, &mut advisories, Advisory::NoLocalConfig);
                None
            }
        };

        let config = overlay_local(global.clone(), local.clone().unwrap_or_default());
        let directives =
            Directives::from_message(&message, &config.ci_skip_regex, &config.cd_skip_regex);

        if opts.enable_fast_skips && directives.skip_ci {
            reporter.info("skip-ci directive found in last commit message; skipping the rest of collection");
            return Ok(Resolution {
                metadata: base_metadata(&config, directives),
                advisories,
            });
        }

        self.provision(context, opts, github_token, &config.node_current_version, reporter)?;

        let manifest = loader
            .manifest(&self.sources.manifest)
            .map_err(PipelineError::from)?;
        let release = match loader.release(&self.sources.release).map_err(PipelineError::from)? {
            Loaded::Present(release) => Some(release),
            Loaded::Absent { resource } => {
                tracing::debug!(%resource, "release config absent");
                note(reporter, &mut advisories, Advisory::NoReleaseConfig);
                None
            }
        };

        let metadata = merge(global, local, &manifest, release.as_ref(), context, directives)?;
        let metadata = authorize(&metadata, context).apply(metadata);

        for gap in Advisory::capability_gaps(&metadata) {
            note(reporter, &mut advisories, gap);
        }
        advisory::reissue_for_debug(
            reporter,
            &advisories,
            metadata.debug_string.as_deref(),
            opts.force_warnings,
        );

        if opts.upload_artifact {
            self.upload_metadata(&metadata, reporter)?;
        }

        tracing::debug!(
            package = metadata.package_name.as_str(),
            branch = metadata.current_branch.as_str(),
            can_release = metadata.can_release,
            can_automerge = metadata.can_automerge,
            "metadata resolved"
        );
        Ok(Resolution {
            metadata,
            advisories,
        })
    }

    /// Reload the metadata an earlier stage uploaded for this commit.
    pub fn download(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Metadata> {
        let github_token = opts.require_github_token()?;
        let key = artifact_key(METADATA_ARTIFACT, &context.sha);

        reporter.info(&format!("downloading metadata artifact {key}..."));
        let paths = self.collab.artifacts.download(&key).map_err(|e| {
            PipelineError::ArtifactUnavailable(format!(
                "failed to acquire metadata artifact `{key}`: {e:#}"
            ))
        })?;
        let path = paths
            .iter()
            .find(|p| p.file_name().is_some_and(|name| name == METADATA_FILE))
            .ok_or_else(|| {
                PipelineError::ArtifactUnavailable(format!(
                    "failed to import metadata artifact `{key}`: no {METADATA_FILE} in artifact"
                ))
            })?;
        let metadata = read_metadata(path).map_err(|e| {
            PipelineError::ArtifactUnavailable(format!(
                "failed to import metadata artifact `{key}`: {e:#}"
            ))
        })?;

        self.provision(context, opts, github_token, &metadata.node_current_version, reporter)?;

        advisory::reissue_for_debug(
            reporter,
            &Advisory::from_metadata(&metadata),
            metadata.debug_string.as_deref(),
            opts.force_warnings,
        );

        Ok(metadata)
    }

    fn provision(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        github_token: &str,
        default_node_version: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let node = match &opts.node {
            NodeOption::Disabled => None,
            NodeOption::Default => Some(default_node_version.to_string()),
            NodeOption::Version(version) => Some(version.clone()),
        };
        if let Some(version) = node {
            reporter.info(&format!("installing node {version}..."));
            self.collab
                .provisioner
                .install_node(&NodeOptions { version }, opts.npm_token.as_deref())
                .context("failed to install node")?;
        }

        let clone = match &opts.repository {
            RepositoryOption::Disabled => None,
            RepositoryOption::Default => Some(CloneOptions::for_context(context)),
            RepositoryOption::Custom(clone) => Some(clone.clone()),
        };
        if let Some(clone) = clone {
            reporter.info(&format!(
                "cloning {}/{}...",
                clone.repository_owner, clone.repository_name
            ));
            self.collab
                .provisioner
                .clone_repository(&clone, github_token)
                .context("failed to clone repository")?;
        }

        Ok(())
    }

    fn upload_metadata(&mut self, metadata: &Metadata, reporter: &mut dyn Reporter) -> Result<()> {
        let path = write_metadata(&self.artifact_dir, metadata)?;
        let key = artifact_key(METADATA_ARTIFACT, &metadata.commit_sha);
        reporter.info(&format!("uploading metadata artifact {key}..."));
        self.collab
            .artifacts
            .upload(&[path], &key, metadata.artifact_retention_days)
            .with_context(|| format!("failed to upload metadata artifact {key}"))
    }
}

fn note(reporter: &mut dyn Reporter, advisories: &mut Vec<Advisory>, advisory: Advisory) {
    reporter.warn(&advisory.to_string());
    advisories.push(advisory);
}
