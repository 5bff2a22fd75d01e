//! Fragment merging.
//!
//! Global config is the base, local overrides are laid over it key by key
//! (administrative keys excepted), then manifest, release tooling and runner
//! context contribute derived fields.

use conveyor_config::{
    ConfigKey, LocalPipelineConfig, Manifest, PipelineConfig, ReleaseConfig, scripts,
};
use conveyor_types::{Metadata, RunnerContext, UNKNOWN_PACKAGE_NAME};

use crate::directive::Directives;
use crate::error::PipelineError;

/// Lay `local` over `global`.
///
/// Local values for administrative keys are dropped without comment.
pub fn overlay_local(global: PipelineConfig, local: LocalPipelineConfig) -> PipelineConfig {
    let mut config = global;

    // exhaustive so a new local key cannot bypass the administrative check
    let LocalPipelineConfig {
        ci_skip_regex,
        cd_skip_regex,
        retry_ceiling_seconds,
        artifact_retention_days,
        can_upload_coverage,
        can_retry_automerge,
        release_actor_whitelist,
        automerge_actor_whitelist,
        release_repo_owner_whitelist,
        npm_ignore_dist_tags,
        node_current_version,
        node_test_versions,
        webpack_test_versions,
        npm_audit_fail_level,
        committer,
        debug_string,
    } = local;

    overlay(ConfigKey::CiSkipRegex, &mut config.ci_skip_regex, ci_skip_regex);
    overlay(ConfigKey::CdSkipRegex, &mut config.cd_skip_regex, cd_skip_regex);
    overlay(
        ConfigKey::RetryCeilingSeconds,
        &mut config.retry_ceiling_seconds,
        retry_ceiling_seconds,
    );
    overlay(
        ConfigKey::ArtifactRetentionDays,
        &mut config.artifact_retention_days,
        artifact_retention_days,
    );
    overlay(
        ConfigKey::CanUploadCoverage,
        &mut config.can_upload_coverage,
        can_upload_coverage,
    );
    overlay(
        ConfigKey::CanRetryAutomerge,
        &mut config.can_retry_automerge,
        can_retry_automerge,
    );
    overlay(
        ConfigKey::ReleaseActorWhitelist,
        &mut config.release_actor_whitelist,
        release_actor_whitelist,
    );
    overlay(
        ConfigKey::AutomergeActorWhitelist,
        &mut config.automerge_actor_whitelist,
        automerge_actor_whitelist,
    );
    overlay(
        ConfigKey::ReleaseRepoOwnerWhitelist,
        &mut config.release_repo_owner_whitelist,
        release_repo_owner_whitelist,
    );
    overlay(
        ConfigKey::NpmIgnoreDistTags,
        &mut config.npm_ignore_dist_tags,
        npm_ignore_dist_tags,
    );
    overlay(
        ConfigKey::NodeCurrentVersion,
        &mut config.node_current_version,
        node_current_version,
    );
    overlay(
        ConfigKey::NodeTestVersions,
        &mut config.node_test_versions,
        node_test_versions,
    );
    overlay(
        ConfigKey::WebpackTestVersions,
        &mut config.webpack_test_versions,
        webpack_test_versions,
    );
    overlay(
        ConfigKey::NpmAuditFailLevel,
        &mut config.npm_audit_fail_level,
        npm_audit_fail_level,
    );
    overlay(ConfigKey::Committer, &mut config.committer, committer);
    overlay(
        ConfigKey::DebugString,
        &mut config.debug_string,
        debug_string.map(Some),
    );

    config
}

fn overlay<T>(key: ConfigKey, base: &mut T, value: Option<T>) {
    if key.is_administrative() {
        return;
    }
    if let Some(value) = value {
        *base = value;
    }
}

/// Metadata carrying only config-derived values.
///
/// Everything that depends on the manifest, release tooling, runner context
/// or authorization is left at its default. This is what a fast skip returns.
pub fn base_metadata(config: &PipelineConfig, directives: Directives) -> Metadata {
    Metadata {
        package_name: UNKNOWN_PACKAGE_NAME.to_string(),
        package_version: None,
        has_deploy: false,
        has_docs: false,
        has_externals: false,
        has_integration_node: false,
        has_integration_client: false,
        has_integration_webpack: false,
        has_integration_externals: false,
        has_bin: false,
        has_private: false,
        should_skip_ci: directives.skip_ci,
        should_skip_cd: directives.skip_cd,
        can_release: false,
        can_automerge: false,
        can_retry_automerge: config.can_retry_automerge,
        can_upload_coverage: config.can_upload_coverage,
        release_actor_whitelist: config.release_actor_whitelist.clone(),
        automerge_actor_whitelist: config.automerge_actor_whitelist.clone(),
        release_repo_owner_whitelist: config.release_repo_owner_whitelist.clone(),
        npm_ignore_dist_tags: config.npm_ignore_dist_tags.clone(),
        pr_number: None,
        commit_sha: String::new(),
        current_branch: String::new(),
        committer: config.committer.clone(),
        artifact_retention_days: config.artifact_retention_days,
        retry_ceiling_seconds: config.retry_ceiling_seconds,
        ci_skip_regex: config.ci_skip_regex.clone(),
        cd_skip_regex: config.cd_skip_regex.clone(),
        debug_string: config.debug_string.clone(),
        node_current_version: config.node_current_version.clone(),
        node_test_versions: config.node_test_versions.clone(),
        webpack_test_versions: config.webpack_test_versions.clone(),
        npm_audit_fail_level: config.npm_audit_fail_level.clone(),
        release_branch_config: Vec::new(),
    }
}

/// Merge all fragments into one record.
///
/// Authorization fields stay `false` (except the pass-through
/// `canRetryAutomerge`); see [`crate::authorize`].
pub fn merge(
    global: PipelineConfig,
    local: Option<LocalPipelineConfig>,
    manifest: &Manifest,
    release: Option<&ReleaseConfig>,
    context: &RunnerContext,
    directives: Directives,
) -> Result<Metadata, PipelineError> {
    let config = overlay_local(global, local.unwrap_or_default());
    let mut metadata = base_metadata(&config, directives);

    apply_manifest(&mut metadata, manifest)?;
    metadata.release_branch_config = release.map(|r| r.branches.clone()).unwrap_or_default();
    apply_context(&mut metadata, context)?;

    Ok(metadata)
}

fn apply_manifest(metadata: &mut Metadata, manifest: &Manifest) -> Result<(), PipelineError> {
    manifest
        .validate()
        .map_err(|e| PipelineError::Validation(e.to_string()))?;

    metadata.package_name = manifest
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_PACKAGE_NAME.to_string());
    metadata.package_version = manifest.version.clone();

    metadata.has_deploy = manifest.has_script(scripts::DEPLOY);
    metadata.has_docs = manifest.has_script(scripts::BUILD_DOCS);
    metadata.has_externals = manifest.has_script(scripts::BUILD_EXTERNALS);
    metadata.has_integration_node = manifest.has_script(scripts::TEST_INTEGRATION_NODE);
    metadata.has_integration_client = manifest.has_script(scripts::TEST_INTEGRATION_CLIENT);
    metadata.has_integration_webpack = manifest.has_script(scripts::TEST_INTEGRATION_WEBPACK);
    metadata.has_integration_externals = manifest.has_script(scripts::TEST_INTEGRATION_EXTERNALS);
    metadata.has_bin = manifest.has_bin();
    metadata.has_private = manifest.private;
    Ok(())
}

fn apply_context(metadata: &mut Metadata, context: &RunnerContext) -> Result<(), PipelineError> {
    metadata.commit_sha = context.sha.clone();
    metadata.current_branch = branch_from_ref(&context.git_ref);
    metadata.pr_number = context.pr_number();

    if context.is_pull_request_event() && metadata.pr_number.is_none() {
        return Err(PipelineError::Validation(format!(
            "could not resolve the PR number associated with this `{}` event",
            context.event_name
        )));
    }
    Ok(())
}

/// Branch (or tag) name from a fully qualified ref.
///
/// `refs/heads/x` and `refs/tags/x` give `x`; any other `refs/<kind>/<rest>`
/// gives `<rest>`; anything else is returned as is.
pub fn branch_from_ref(git_ref: &str) -> String {
    if let Some(rest) = git_ref
        .strip_prefix("refs/heads/")
        .or_else(|| git_ref.strip_prefix("refs/tags/"))
    {
        return rest.to_string();
    }

    git_ref
        .strip_prefix("refs/")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_else(|| git_ref.to_string())
}
