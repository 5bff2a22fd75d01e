//! Where fragments come from and how they are loaded.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use crate::fragments::{LocalPipelineConfig, Manifest, PipelineConfig, ReleaseConfig};

/// Repository-relative path of the local pipeline config.
pub const LOCAL_CONFIG_FILE: &str = ".github/pipeline.config.toml";
/// Repository-relative path of the package manifest.
pub const MANIFEST_FILE: &str = "package.json";
/// Repository-relative path of the release tooling config.
pub const RELEASE_CONFIG_FILE: &str = "release.config.json";

/// Default timeout for config fetches.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent with config fetches.
pub const USER_AGENT: &str = concat!("conveyor/", env!("CARGO_PKG_VERSION"));

/// Location of one config fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Remote { url: String },
    LocalFile { path: PathBuf },
    Embedded { name: String, contents: String },
}

impl ConfigSource {
    pub fn remote(url: impl Into<String>) -> Self {
        ConfigSource::Remote { url: url.into() }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        ConfigSource::LocalFile { path: path.into() }
    }

    pub fn embedded(name: impl Into<String>, contents: impl Into<String>) -> Self {
        ConfigSource::Embedded {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Remote { url } => f.write_str(url),
            ConfigSource::LocalFile { path } => write!(f, "{}", path.display()),
            ConfigSource::Embedded { name, .. } => write!(f, "<embedded {name}>"),
        }
    }
}

/// The four fragment locations of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    pub global: ConfigSource,
    pub local: ConfigSource,
    pub manifest: ConfigSource,
    pub release: ConfigSource,
}

impl ConfigSources {
    /// Standard layout: remote global config, everything else under `root`.
    pub fn for_root(root: &Path, global_url: &str) -> Self {
        Self {
            global: ConfigSource::remote(global_url),
            local: ConfigSource::file(root.join(LOCAL_CONFIG_FILE)),
            manifest: ConfigSource::file(root.join(MANIFEST_FILE)),
            release: ConfigSource::file(root.join(RELEASE_CONFIG_FILE)),
        }
    }
}

/// Why a fragment could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("could not find {resource}")]
    NotFound { resource: String },
    #[error("failed to import {resource}: {reason}")]
    Import { resource: String, reason: String },
    #[error("failed to fetch {resource}: {reason}")]
    Fetch { resource: String, reason: String },
}

/// Outcome of loading an optional fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    Present(T),
    Absent { resource: String },
}

impl<T> Loaded<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Loaded::Present(value) => Some(value),
            Loaded::Absent { .. } => None,
        }
    }
}

/// Retrieves remote documents.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        match resp.status() {
            StatusCode::OK => resp
                .text()
                .with_context(|| format!("failed to read response body from {url}")),
            s => bail!("unexpected status while fetching {url}: {s}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Json,
    Toml,
}

/// Loads fragments under the per-fragment absence policy.
pub struct ConfigLoader<'f> {
    fetcher: &'f dyn Fetcher,
}

impl<'f> ConfigLoader<'f> {
    pub fn new(fetcher: &'f dyn Fetcher) -> Self {
        Self { fetcher }
    }

    /// Global config; every failure is fatal to the caller.
    pub fn global(&self, source: &ConfigSource) -> Result<PipelineConfig, LoadError> {
        self.load(source, Format::Json)
    }

    /// Package manifest; absence and import failure are both fatal.
    pub fn manifest(&self, source: &ConfigSource) -> Result<Manifest, LoadError> {
        self.load(source, Format::Json)
    }

    /// Local overrides; absence is tolerated.
    pub fn local(&self, source: &ConfigSource) -> Result<Loaded<LocalPipelineConfig>, LoadError> {
        self.load_optional(source, Format::Toml)
    }

    /// Release tooling config; absence is tolerated.
    pub fn release(&self, source: &ConfigSource) -> Result<Loaded<ReleaseConfig>, LoadError> {
        self.load_optional(source, Format::Json)
    }

    fn load_optional<T: DeserializeOwned>(
        &self,
        source: &ConfigSource,
        format: Format,
    ) -> Result<Loaded<T>, LoadError> {
        match self.load(source, format) {
            Ok(value) => Ok(Loaded::Present(value)),
            Err(LoadError::NotFound { resource }) => Ok(Loaded::Absent { resource }),
            Err(err) => Err(err),
        }
    }

    fn load<T: DeserializeOwned>(&self, source: &ConfigSource, format: Format) -> Result<T, LoadError> {
        let resource = source.to_string();
        let text = self.read(source, &resource)?;
        tracing::debug!(%resource, "loaded config fragment");

        let parsed = match format {
            Format::Json => serde_json::from_str(&text).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(&text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| LoadError::Import { resource, reason })
    }

    fn read(&self, source: &ConfigSource, resource: &str) -> Result<String, LoadError> {
        match source {
            ConfigSource::Remote { url } => self.fetcher.fetch(url).map_err(|e| LoadError::Fetch {
                resource: resource.to_string(),
                reason: format!("{e:#}"),
            }),
            ConfigSource::LocalFile { path } => {
                if !path.exists() {
                    return Err(LoadError::NotFound {
                        resource: resource.to_string(),
                    });
                }
                fs::read_to_string(path).map_err(|e| LoadError::Import {
                    resource: resource.to_string(),
                    reason: e.to_string(),
                })
            }
            ConfigSource::Embedded { contents, .. } => Ok(contents.clone()),
        }
    }
}
