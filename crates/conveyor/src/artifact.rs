use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use conveyor_types::Metadata;

/// File name of the serialized metadata inside its artifact.
pub const METADATA_FILE: &str = "metadata.json";

/// Runner operating system, part of every artifact key.
pub const RUNNER_OS_ENV: &str = "RUNNER_OS";

pub const METADATA_ARTIFACT: &str = "metadata";
pub const BUILD_ARTIFACT: &str = "build";

/// CI artifact storage shared between pipeline stages.
pub trait ArtifactStore {
    fn upload(&mut self, paths: &[PathBuf], key: &str, retention_days: u32) -> Result<()>;
    /// Fetch the artifact stored under `key`; returns the local file paths.
    fn download(&mut self, key: &str) -> Result<Vec<PathBuf>>;
}

/// `<kind>-<RUNNER_OS>-<sha>`
pub fn artifact_key(kind: &str, sha: &str) -> String {
    let os = env::var(RUNNER_OS_ENV).unwrap_or_else(|_| "unknown".to_string());
    format!("{kind}-{os}-{sha}")
}

/// Write `metadata` to `<dir>/metadata.json`, atomically.
pub fn write_metadata(dir: &Path, metadata: &Metadata) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;
    let path = dir.join(METADATA_FILE);
    atomic_write_json(&path, metadata)?;
    Ok(path)
}

pub fn read_metadata(path: &Path) -> Result<Metadata> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read metadata file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse metadata JSON {}", path.display()))
}

fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let data = serde_json::to_vec_pretty(value).context("failed to serialize JSON")?;

    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("failed to create tmp file {}", tmp.display()))?;
        f.write_all(&data)
            .with_context(|| format!("failed to write tmp file {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path).with_context(|| {
        format!(
            "failed to rename tmp file {} to {}",
            tmp.display(),
            path.display()
        )
    })?;

    Ok(())
}
