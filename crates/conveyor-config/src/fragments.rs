//! Typed configuration fragments.

use std::collections::BTreeMap;

use conveyor_types::{BranchReleaseEntry, Committer, SkipPattern};
use serde::{Deserialize, Serialize};

/// Script names whose presence in the manifest drives capabilities.
pub mod scripts {
    pub const DEPLOY: &str = "deploy";
    pub const BUILD_DOCS: &str = "build-docs";
    pub const BUILD_EXTERNALS: &str = "build-externals";
    pub const TEST_INTEGRATION_CLIENT: &str = "test-integration-client";
    pub const TEST_INTEGRATION_NODE: &str = "test-integration-node";
    pub const TEST_INTEGRATION_EXTERNALS: &str = "test-integration-externals";
    pub const TEST_INTEGRATION_WEBPACK: &str = "test-integration-webpack";
}

/// Every pipeline option a config fragment may set.
///
/// Administrative keys are owned by the operator-controlled global config;
/// a repository-local value for one of them is discarded during the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    CiSkipRegex,
    CdSkipRegex,
    RetryCeilingSeconds,
    ArtifactRetentionDays,
    CanUploadCoverage,
    CanRetryAutomerge,
    ReleaseActorWhitelist,
    AutomergeActorWhitelist,
    ReleaseRepoOwnerWhitelist,
    NpmIgnoreDistTags,
    NodeCurrentVersion,
    NodeTestVersions,
    WebpackTestVersions,
    NpmAuditFailLevel,
    Committer,
    DebugString,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 16] = [
        ConfigKey::CiSkipRegex,
        ConfigKey::CdSkipRegex,
        ConfigKey::RetryCeilingSeconds,
        ConfigKey::ArtifactRetentionDays,
        ConfigKey::CanUploadCoverage,
        ConfigKey::CanRetryAutomerge,
        ConfigKey::ReleaseActorWhitelist,
        ConfigKey::AutomergeActorWhitelist,
        ConfigKey::ReleaseRepoOwnerWhitelist,
        ConfigKey::NpmIgnoreDistTags,
        ConfigKey::NodeCurrentVersion,
        ConfigKey::NodeTestVersions,
        ConfigKey::WebpackTestVersions,
        ConfigKey::NpmAuditFailLevel,
        ConfigKey::Committer,
        ConfigKey::DebugString,
    ];

    pub const fn is_administrative(self) -> bool {
        match self {
            ConfigKey::ReleaseRepoOwnerWhitelist
            | ConfigKey::ReleaseActorWhitelist
            | ConfigKey::AutomergeActorWhitelist
            | ConfigKey::NpmIgnoreDistTags
            | ConfigKey::CanRetryAutomerge => true,
            ConfigKey::CiSkipRegex
            | ConfigKey::CdSkipRegex
            | ConfigKey::RetryCeilingSeconds
            | ConfigKey::ArtifactRetentionDays
            | ConfigKey::CanUploadCoverage
            | ConfigKey::NodeCurrentVersion
            | ConfigKey::NodeTestVersions
            | ConfigKey::WebpackTestVersions
            | ConfigKey::NpmAuditFailLevel
            | ConfigKey::Committer
            | ConfigKey::DebugString => false,
        }
    }

    /// Key as spelled in the global config document.
    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigKey::CiSkipRegex => "ciSkipRegex",
            ConfigKey::CdSkipRegex => "cdSkipRegex",
            ConfigKey::RetryCeilingSeconds => "retryCeilingSeconds",
            ConfigKey::ArtifactRetentionDays => "artifactRetentionDays",
            ConfigKey::CanUploadCoverage => "canUploadCoverage",
            ConfigKey::CanRetryAutomerge => "canRetryAutomerge",
            ConfigKey::ReleaseActorWhitelist => "releaseActorWhitelist",
            ConfigKey::AutomergeActorWhitelist => "automergeActorWhitelist",
            ConfigKey::ReleaseRepoOwnerWhitelist => "releaseRepoOwnerWhitelist",
            ConfigKey::NpmIgnoreDistTags => "npmIgnoreDistTags",
            ConfigKey::NodeCurrentVersion => "nodeCurrentVersion",
            ConfigKey::NodeTestVersions => "nodeTestVersions",
            ConfigKey::WebpackTestVersions => "webpackTestVersions",
            ConfigKey::NpmAuditFailLevel => "npmAuditFailLevel",
            ConfigKey::Committer => "committer",
            ConfigKey::DebugString => "debugString",
        }
    }
}

/// Operator-controlled global pipeline config (JSON, camelCase keys).
///
/// Every key has a default, so a partial document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub ci_skip_regex: SkipPattern,
    pub cd_skip_regex: SkipPattern,
    pub retry_ceiling_seconds: u64,
    pub artifact_retention_days: u32,
    pub can_upload_coverage: bool,
    pub can_retry_automerge: bool,
    pub release_actor_whitelist: Vec<String>,
    pub automerge_actor_whitelist: Vec<String>,
    pub release_repo_owner_whitelist: Vec<String>,
    pub npm_ignore_dist_tags: Vec<String>,
    pub node_current_version: String,
    pub node_test_versions: Vec<String>,
    pub webpack_test_versions: Vec<String>,
    pub npm_audit_fail_level: String,
    pub committer: Committer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_string: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ci_skip_regex: SkipPattern::default_ci(),
            cd_skip_regex: SkipPattern::default_cd(),
            retry_ceiling_seconds: 180,
            artifact_retention_days: 90,
            can_upload_coverage: true,
            can_retry_automerge: false,
            release_actor_whitelist: Vec::new(),
            automerge_actor_whitelist: Vec::new(),
            release_repo_owner_whitelist: Vec::new(),
            npm_ignore_dist_tags: Vec::new(),
            node_current_version: "lts/*".to_string(),
            node_test_versions: Vec::new(),
            webpack_test_versions: Vec::new(),
            npm_audit_fail_level: "high".to_string(),
            committer: Committer::default(),
            debug_string: None,
        }
    }
}

/// Repository-local overrides (`.github/pipeline.config.toml`).
///
/// Administrative keys parse so that a hostile file is still readable, but
/// their values never survive the merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPipelineConfig {
    pub ci_skip_regex: Option<SkipPattern>,
    pub cd_skip_regex: Option<SkipPattern>,
    pub retry_ceiling_seconds: Option<u64>,
    pub artifact_retention_days: Option<u32>,
    pub can_upload_coverage: Option<bool>,
    pub can_retry_automerge: Option<bool>,
    pub release_actor_whitelist: Option<Vec<String>>,
    pub automerge_actor_whitelist: Option<Vec<String>>,
    pub release_repo_owner_whitelist: Option<Vec<String>>,
    pub npm_ignore_dist_tags: Option<Vec<String>>,
    pub node_current_version: Option<String>,
    pub node_test_versions: Option<Vec<String>>,
    pub webpack_test_versions: Option<Vec<String>>,
    pub npm_audit_fail_level: Option<String>,
    pub committer: Option<Committer>,
    pub debug_string: Option<String>,
}

/// The parts of `package.json` the pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub bin: Option<serde_json::Value>,
    #[serde(default)]
    pub scripts: BTreeMap<String, serde_json::Value>,
}

/// A paired script declared without its partner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected both `{present}` and `{missing}` scripts or neither")]
pub struct UnpairedScripts {
    pub present: &'static str,
    pub missing: &'static str,
}

impl Manifest {
    /// Presence only; the script body is never inspected.
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn has_bin(&self) -> bool {
        match &self.bin {
            Some(serde_json::Value::String(path)) => !path.is_empty(),
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            _ => false,
        }
    }

    /// Externals must be built and tested together.
    pub fn validate(&self) -> Result<(), UnpairedScripts> {
        let build = self.has_script(scripts::BUILD_EXTERNALS);
        let test = self.has_script(scripts::TEST_INTEGRATION_EXTERNALS);

        match (build, test) {
            (true, false) => Err(UnpairedScripts {
                present: scripts::BUILD_EXTERNALS,
                missing: scripts::TEST_INTEGRATION_EXTERNALS,
            }),
            (false, true) => Err(UnpairedScripts {
                present: scripts::TEST_INTEGRATION_EXTERNALS,
                missing: scripts::BUILD_EXTERNALS,
            }),
            _ => Ok(()),
        }
    }
}

/// Release tooling config (`release.config.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default)]
    pub branches: Vec<BranchReleaseEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_five_keys_are_administrative() {
        let admin: Vec<_> = ConfigKey::ALL
            .into_iter()
            .filter(|k| k.is_administrative())
            .map(ConfigKey::as_str)
            .collect();
        assert_eq!(
            admin,
            vec![
                "canRetryAutomerge",
                "releaseActorWhitelist",
                "automergeActorWhitelist",
                "releaseRepoOwnerWhitelist",
                "npmIgnoreDistTags",
            ]
        );
    }

    #[test]
    fn config_key_names_match_serialized_global_keys() {
        let json = serde_json::to_value(PipelineConfig {
            debug_string: Some("x".to_string()),
            ..PipelineConfig::default()
        })
        .expect("serialize");
        let object = json.as_object().expect("object");

        for key in ConfigKey::ALL {
            assert!(object.contains_key(key.as_str()), "missing {}", key.as_str());
        }
        assert_eq!(object.len(), ConfigKey::ALL.len());
    }

    #[test]
    fn partial_global_config_takes_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{ "npmAuditFailLevel": "high", "committer": { "name": "A", "email": "a@x" } }"#,
        )
        .expect("parse");

        assert_eq!(cfg.committer.name, "A");
        assert_eq!(cfg.retry_ceiling_seconds, 180);
        assert_eq!(cfg.artifact_retention_days, 90);
        assert!(cfg.can_upload_coverage);
        assert!(!cfg.can_retry_automerge);
        assert_eq!(cfg.ci_skip_regex, SkipPattern::default_ci());
        assert!(cfg.release_actor_whitelist.is_empty());
    }

    #[test]
    fn local_config_parses_from_toml() {
        let cfg: LocalPipelineConfig = toml::from_str(
            r#"
artifact_retention_days = 50
debug_string = "debug-string"
release_actor_whitelist = ["evil-actor"]

[ci_skip_regex]
source = "\\[nope\\]"
flags = "i"
"#,
        )
        .expect("parse");

        assert_eq!(cfg.artifact_retention_days, Some(50));
        assert_eq!(cfg.debug_string.as_deref(), Some("debug-string"));
        assert_eq!(cfg.release_actor_whitelist, Some(vec!["evil-actor".to_string()]));
        let pattern = cfg.ci_skip_regex.expect("pattern");
        assert!(pattern.is_match("[NOPE]"));
        assert!(cfg.cd_skip_regex.is_none());
    }

    #[test]
    fn manifest_capabilities_follow_script_presence() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "name": "pkg", "scripts": { "deploy": "", "build-docs": "typedoc" }, "bin": { "pkg": "./cli.js" } }"#,
        )
        .expect("parse");

        assert!(manifest.has_script(scripts::DEPLOY));
        assert!(manifest.has_script(scripts::BUILD_DOCS));
        assert!(!manifest.has_script(scripts::TEST_INTEGRATION_NODE));
        assert!(manifest.has_bin());
        assert!(!manifest.private);
    }

    #[test]
    fn manifest_bin_as_string_or_missing() {
        let with_string: Manifest =
            serde_json::from_str(r#"{ "bin": "./cli.js" }"#).expect("parse");
        assert!(with_string.has_bin());

        let empty: Manifest = serde_json::from_str(r#"{ "bin": "" }"#).expect("parse");
        assert!(!empty.has_bin());

        assert!(!Manifest::default().has_bin());
    }

    #[test]
    fn unpaired_externals_scripts_are_rejected() {
        let mut manifest = Manifest::default();
        manifest
            .scripts
            .insert(scripts::BUILD_EXTERNALS.to_string(), serde_json::json!("yes"));
        let err = manifest.validate().expect_err("must fail");
        insta::assert_snapshot!(
            err.to_string(),
            @"expected both `build-externals` and `test-integration-externals` scripts or neither"
        );

        manifest
            .scripts
            .insert(scripts::TEST_INTEGRATION_EXTERNALS.to_string(), serde_json::json!("yes"));
        assert!(manifest.validate().is_ok());

        manifest.scripts.remove(scripts::BUILD_EXTERNALS);
        let err = manifest.validate().expect_err("must fail");
        assert_eq!(err.present, scripts::TEST_INTEGRATION_EXTERNALS);
    }

    #[test]
    fn release_config_accepts_mixed_branches() {
        let cfg: ReleaseConfig = serde_json::from_str(
            r#"{ "branches": ["main", { "name": "canary", "channel": "canary", "prerelease": true }], "plugins": [] }"#,
        )
        .expect("parse");
        assert_eq!(cfg.branches.len(), 2);
        assert_eq!(cfg.branches[1].channel(), Some("canary"));
    }
}
