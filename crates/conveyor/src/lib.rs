//! # Conveyor
//!
//! Metadata resolution and component actions for npm package CI pipelines.
//!
//! Every workflow step starts by resolving one [`Metadata`](conveyor_types::Metadata)
//! record: the operator's global config, repository-local overrides, the
//! package manifest and the release tooling config are merged, then the
//! runner context decides who may release or auto-merge. The record is
//! uploaded as an artifact so later stages of the same commit see the same
//! answer.
//!
//! ## Pipeline
//!
//! 1. [`Pipeline::collect`] loads and merges the config fragments, reads the
//!    last commit message for skip directives and authorizes the actor.
//! 2. [`Pipeline::download`] reloads the record a previous stage uploaded.
//! 3. [`Pipeline::run`] executes a [`ComponentAction`](conveyor_types::ComponentAction)
//!    such as `lint`, `test-unit-then-build`, `cleanup-npm` or `verify-release`.
//!
//! Local overrides never reach the administrative keys (whitelists, ignored
//! dist tags, auto-merge retry). Eligibility flags default to `false`.
//!
//! ## Boundaries
//!
//! Everything that touches the outside world goes through a trait bundled in
//! [`Collaborators`]: [`Vcs`](conveyor_git::Vcs) for git,
//! [`Provisioner`] for node and checkout,
//! [`ArtifactStore`] for artifact storage,
//! [`CommandRunner`](conveyor_process::CommandRunner) for npm,
//! [`Fetcher`](conveyor_config::Fetcher) for the remote global config and
//! [`Clock`](conveyor_retry::Clock) for retry ceilings.
//!
//! ## Modules
//!
//! - [`pipeline`]: metadata collection and download
//! - [`actions`]: component actions
//! - [`merge`]: config overlay and metadata derivation
//! - [`authorize`]: release and auto-merge eligibility
//! - [`directive`]: skip directives in commit messages
//! - [`advisory`]: non-fatal warnings and debug mode
//! - [`artifact`]: artifact keys and metadata files
//! - [`options`]: invoker options and provisioning
//! - [`reporter`]: progress output
//! - [`error`]: typed pipeline failures

/// Component actions.
pub mod actions;

/// Non-fatal advisories and debug-mode reissue.
pub mod advisory;

/// Artifact keys, storage trait and metadata files.
pub mod artifact;

/// Release and auto-merge eligibility.
pub mod authorize;

/// Skip directives read from commit messages.
pub mod directive;

pub mod error;

/// Config overlay and metadata derivation.
pub mod merge;

/// Invoker options and runner provisioning.
pub mod options;

/// Metadata collection and download.
pub mod pipeline;

pub mod reporter;

pub use advisory::Advisory;
pub use artifact::ArtifactStore;
pub use authorize::{Authorization, authorize};
pub use directive::Directives;
pub use error::PipelineError;
pub use options::{CloneOptions, InvokerOptions, NodeOption, NodeOptions, Provisioner, RepositoryOption};
pub use pipeline::{Collaborators, Pipeline, Resolution};
pub use reporter::{Reporter, StderrReporter, TracingReporter};
