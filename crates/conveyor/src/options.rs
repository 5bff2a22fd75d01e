use std::path::PathBuf;

use anyhow::Result;
use conveyor_types::RunnerContext;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// How node should be provisioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeOption {
    Disabled,
    /// Install the version named by the resolved config.
    #[default]
    Default,
    Version(String),
}

/// How the repository should be checked out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RepositoryOption {
    Disabled,
    /// Clone the repository of the runner context at its sha.
    #[default]
    Default,
    Custom(CloneOptions),
}

/// Arguments handed to [`Provisioner::install_node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOptions {
    pub version: String,
}

/// Arguments handed to [`Provisioner::clone_repository`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneOptions {
    pub repository_owner: String,
    pub repository_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_or_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_path: Option<PathBuf>,
}

impl CloneOptions {
    pub fn for_context(context: &RunnerContext) -> Self {
        Self {
            repository_owner: context.repo.owner.clone(),
            repository_name: context.repo.repo.clone(),
            branch_or_tag: None,
            checkout_ref: (!context.sha.is_empty()).then(|| context.sha.clone()),
            fetch_depth: None,
            repository_path: None,
        }
    }
}

/// Options supplied by whoever invokes a component action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerOptions {
    pub github_token: Option<String>,
    pub npm_token: Option<String>,
    pub node: NodeOption,
    pub repository: RepositoryOption,
    pub upload_artifact: bool,
    pub enable_fast_skips: bool,
    pub force_warnings: bool,
}

impl Default for InvokerOptions {
    fn default() -> Self {
        Self {
            github_token: None,
            npm_token: None,
            node: NodeOption::Default,
            repository: RepositoryOption::Default,
            upload_artifact: false,
            enable_fast_skips: true,
            force_warnings: false,
        }
    }
}

impl InvokerOptions {
    pub(crate) fn require_github_token(&self) -> Result<&str, PipelineError> {
        required(self.github_token.as_deref(), "githubToken")
    }

    pub(crate) fn require_npm_token(&self) -> Result<&str, PipelineError> {
        required(self.npm_token.as_deref(), "npmToken")
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, PipelineError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(PipelineError::MissingRequiredOption(name))
}

/// Runner provisioning. Implementations live with the CI integration.
pub trait Provisioner {
    fn install_node(&mut self, options: &NodeOptions, npm_token: Option<&str>) -> Result<()>;
    fn clone_repository(&mut self, options: &CloneOptions, github_token: &str) -> Result<()>;
    /// Install the checked out package's dependencies.
    fn install_dependencies(&mut self) -> Result<()>;
}
