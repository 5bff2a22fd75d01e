use conveyor_types::{Metadata, RunnerContext};
use serde::{Deserialize, Serialize};

/// Eligibility derived from identity, ownership and PR state.
///
/// Every flag defaults to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub can_release: bool,
    pub can_automerge: bool,
    pub can_retry_automerge: bool,
}

impl Authorization {
    /// Copy the flags into `metadata`.
    pub fn apply(self, mut metadata: Metadata) -> Metadata {
        metadata.can_release = self.can_release;
        metadata.can_automerge = self.can_automerge;
        metadata.can_retry_automerge = self.can_retry_automerge;
        metadata
    }
}

/// Resolve release and auto-merge eligibility.
///
/// Whitelist comparisons ignore ASCII case. A push event whose payload still
/// carries a pull request counts as PR context for auto-merge.
pub fn authorize(metadata: &Metadata, context: &RunnerContext) -> Authorization {
    let can_release = listed(&metadata.release_repo_owner_whitelist, &context.repo.owner)
        && listed(&metadata.release_actor_whitelist, &context.actor)
        && !context.is_pull_request_event();

    let is_draft = context.pull_request().is_some_and(|pr| pr.draft);
    let can_automerge = listed(&metadata.automerge_actor_whitelist, &context.actor)
        && metadata.pr_number.is_some()
        && !is_draft;

    Authorization {
        can_release,
        can_automerge,
        can_retry_automerge: metadata.can_retry_automerge,
    }
}

fn listed(whitelist: &[String], value: &str) -> bool {
    !value.is_empty() && whitelist.iter().any(|entry| entry.eq_ignore_ascii_case(value))
}
