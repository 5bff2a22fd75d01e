//! Component actions.
//!
//! Each action obtains the resolved metadata, returns early when the commit
//! asked to skip, and otherwise runs a short sequence of npm commands.

use std::time::Duration;

use anyhow::{Context, Result};
use conveyor_process::CommandResult;
use conveyor_registry::{NpmDistTags, npmrc_path, prune_dist_tags, reconcile, write_npm_token};
use conveyor_retry::retry_until;
use conveyor_types::{ComponentAction, Metadata, RunnerContext};

use crate::artifact::{BUILD_ARTIFACT, artifact_key};
use crate::error::PipelineError;
use crate::options::{InvokerOptions, RepositoryOption};
use crate::pipeline::Pipeline;
use crate::reporter::Reporter;

/// Directories uploaded by `test-unit-then-build`.
pub const BUILD_OUTPUT_DIR: &str = "dist";
pub const DOCS_OUTPUT_DIR: &str = "docs";

impl Pipeline<'_> {
    /// Run one component action to completion.
    pub fn run(
        &mut self,
        action: ComponentAction,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        tracing::debug!(action = %action, "running component action");
        match action {
            ComponentAction::MetadataCollect => self.collect(context, opts, reporter).map(|_| ()),
            ComponentAction::MetadataDownload => self.download(context, opts, reporter).map(|_| ()),
            ComponentAction::AuditRuntime => self.audit_runtime(context, opts, reporter),
            ComponentAction::CleanupNpm => self.cleanup_npm(context, opts, reporter),
            ComponentAction::Lint => self.npm_script(action, "lint", context, opts, reporter),
            ComponentAction::TestIntegrationClient
            | ComponentAction::TestIntegrationExternals
            | ComponentAction::TestIntegrationNode
            | ComponentAction::TestIntegrationWebpack => {
                self.npm_script(action, action.as_str(), context, opts, reporter)
            }
            ComponentAction::TestUnitThenBuild => self.test_unit_then_build(context, opts, reporter),
            ComponentAction::VerifyRelease => self.verify_release(context, opts, reporter),
        }
    }

    /// Metadata for an action: collection with fast skips forced on.
    fn action_metadata(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Metadata> {
        let opts = InvokerOptions {
            enable_fast_skips: true,
            ..opts.clone()
        };
        Ok(self.collect(context, &opts, reporter)?.metadata)
    }

    fn npm_script(
        &mut self,
        action: ComponentAction,
        script: &str,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let metadata = self.action_metadata(context, opts, reporter)?;
        if skipped(action, metadata.should_skip_ci, reporter) {
            return Ok(());
        }

        self.install_dependencies()?;
        self.npm(&["run", script])?;
        Ok(())
    }

    fn audit_runtime(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let metadata = self.action_metadata(context, opts, reporter)?;
        if skipped(ComponentAction::AuditRuntime, metadata.should_skip_ci, reporter) {
            return Ok(());
        }

        let level = format!("--audit-level={}", metadata.npm_audit_fail_level);
        self.npm(&["audit", "--production", level.as_str()])
            .context("npm audit reported vulnerabilities at or above the configured level")?;
        Ok(())
    }

    fn test_unit_then_build(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let metadata = self.action_metadata(context, opts, reporter)?;
        if skipped(ComponentAction::TestUnitThenBuild, metadata.should_skip_ci, reporter) {
            return Ok(());
        }

        self.install_dependencies()?;
        self.npm(&["run", "test-unit"])?;
        self.npm(&["run", "build-dist"])?;

        let mut outputs = vec![self.root.join(BUILD_OUTPUT_DIR)];
        if metadata.has_docs {
            self.npm(&["run", "build-docs"])?;
            outputs.push(self.root.join(DOCS_OUTPUT_DIR));
        }

        let key = artifact_key(BUILD_ARTIFACT, &metadata.commit_sha);
        reporter.info(&format!("uploading build artifact {key}..."));
        self.collab
            .artifacts
            .upload(&outputs, &key, metadata.artifact_retention_days)
            .with_context(|| format!("failed to upload build artifact {key}"))
    }

    fn cleanup_npm(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let token = opts.require_npm_token()?;
        let metadata = self.action_metadata(context, opts, reporter)?;
        if skipped(ComponentAction::CleanupNpm, metadata.should_skip_ci, reporter) {
            return Ok(());
        }

        npmrc_path(self.home.as_deref())
            .and_then(|path| write_npm_token(&path, token))
            .map_err(|e| PipelineError::PartialFailure {
                operation: "cleanup-npm".to_string(),
                detail: format!("failed to persist npm token: {e:#}"),
            })?;

        let package = metadata.package_name.as_str();
        // without the live branches every tag would look stale
        let branches = match self.collab.vcs.live_branches() {
            Ok(branches) => branches,
            Err(e) => {
                reporter.warn(&format!(
                    "failed to list live branches; not deleting any dist tag of {package}: {e:#}"
                ));
                return Ok(());
            }
        };
        let mut npm = NpmDistTags::new(&mut *self.collab.runner);
        let tags = npm.list(package).unwrap_or_else(|e| {
            reporter.warn(&format!("failed to list dist tags: {e:#}"));
            Vec::new()
        });

        let stale = reconcile(
            &metadata.release_branch_config,
            &branches,
            &tags,
            &metadata.npm_ignore_dist_tags,
        )
        .context("invalid release branch configuration")?;

        let report = prune_dist_tags(&mut npm, package, &stale);
        for (tag, error) in &report.failed {
            reporter.warn(&format!("failed to delete dist tag {tag} of {package}: {error}"));
        }
        reporter.info(&format!(
            "deleted {} stale dist tag(s) of {package}",
            report.deleted.len()
        ));
        Ok(())
    }

    fn verify_release(
        &mut self,
        context: &RunnerContext,
        opts: &InvokerOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let opts = InvokerOptions {
            enable_fast_skips: true,
            repository: RepositoryOption::Disabled,
            ..opts.clone()
        };
        let metadata = self.download(context, &opts, reporter)?;
        let skip = metadata.should_skip_ci || metadata.should_skip_cd;
        if skipped(ComponentAction::VerifyRelease, skip, reporter) {
            return Ok(());
        }

        // private packages are not published to the public registry
        if metadata.has_private {
            reporter.info("package is private; skipping release verification");
            return Ok(());
        }

        let package = metadata.package_name.as_str();
        let spec = format!(
            "{package}@{}",
            metadata.package_version.as_deref().unwrap_or("latest")
        );
        let ceiling = Duration::from_secs(metadata.retry_ceiling_seconds);

        reporter.info(&format!("installing {spec} from the registry..."));
        let runner = &mut *self.collab.runner;
        retry_until(self.collab.clock, ceiling, "install", |attempt| {
            tracing::debug!(attempt, spec = spec.as_str(), "installing released package");
            runner
                .run("npm", &["install", "--no-save", spec.as_str()])
                .and_then(|result| result.ok().map(|_| ()))
        })
        .map_err(PipelineError::RetryExceeded)?;

        let require = format!("require('{package}')");
        self.npm_program("node", &["-e", require.as_str()])
            .context("generic execution test failed")?;

        if metadata.has_bin {
            self.npm_program("npx", &["--no-install", package, "--help"])
                .context("npx cli test failed")?;
        }

        reporter.info(&format!("verified release of {spec}"));
        Ok(())
    }

    fn install_dependencies(&mut self) -> Result<()> {
        self.collab
            .provisioner
            .install_dependencies()
            .context("failed to install dependencies")
    }

    fn npm(&mut self, args: &[&str]) -> Result<CommandResult> {
        self.npm_program("npm", args)
    }

    fn npm_program(&mut self, program: &str, args: &[&str]) -> Result<CommandResult> {
        let result = self.collab.runner.run(program, args)?;
        result
            .ok()
            .with_context(|| format!("`{program} {}` failed", args.join(" ")))?;
        Ok(result)
    }
}

fn skipped(action: ComponentAction, skip: bool, reporter: &mut dyn Reporter) -> bool {
    if skip {
        tracing::debug!(action = %action, "skipped component action");
        reporter.info(&format!("skipped component action \"{action}\""));
    }
    skip
}
