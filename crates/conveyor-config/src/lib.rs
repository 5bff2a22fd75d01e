//! Pipeline configuration for conveyor.
//!
//! Four independent fragments feed a resolution pass:
//!
//! - the operator-controlled global config (remote JSON),
//! - repository-local overrides (`.github/pipeline.config.toml`),
//! - the package manifest (`package.json`),
//! - the release tooling config (`release.config.json`).
//!
//! Each fragment is addressed by a [`ConfigSource`] and loaded through a
//! [`ConfigLoader`], which applies the absence policy of that fragment:
//! optional fragments come back as [`Loaded::Absent`], required ones as a
//! [`LoadError`] that keeps "could not find" and "failed to import" apart.
//!
//! # Example
//!
//! ```
//! use conveyor_config::{ConfigLoader, ConfigSource, Fetcher};
//!
//! struct Offline;
//! impl Fetcher for Offline {
//!     fn fetch(&self, url: &str) -> anyhow::Result<String> {
//!         anyhow::bail!("offline: {url}")
//!     }
//! }
//!
//! let loader = ConfigLoader::new(&Offline);
//! let global = loader
//!     .global(&ConfigSource::embedded("global", r#"{ "artifactRetentionDays": 7 }"#))
//!     .expect("embedded config parses");
//! assert_eq!(global.artifact_retention_days, 7);
//! assert_eq!(global.retry_ceiling_seconds, 180);
//! ```

mod fragments;
mod source;

pub use fragments::{
    ConfigKey, LocalPipelineConfig, Manifest, PipelineConfig, ReleaseConfig, UnpairedScripts,
    scripts,
};
pub use source::{
    ConfigLoader, ConfigSource, ConfigSources, DEFAULT_TIMEOUT_SECS, Fetcher, HttpFetcher,
    LOCAL_CONFIG_FILE, LoadError, Loaded, MANIFEST_FILE, RELEASE_CONFIG_FILE, USER_AGENT,
};
