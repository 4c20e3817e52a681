//! Pool configuration and manifests.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use super::error::{PoolError, PoolResult};
use super::source::SourceKind;
use crate::archive;

/// Pool configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Directory scratch directories are created in. `None` means the host
    /// temp directory.
    pub scratch_root: Option<PathBuf>,
    /// Name prefix of scratch directories.
    pub scratch_prefix: String,
    /// File extensions (without dots) recognised as archives.
    pub archive_extensions: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            scratch_prefix: "repopool-archive".to_string(),
            archive_extensions: vec![archive::DEFAULT_EXTENSION.to_string()],
        }
    }
}

impl PoolConfig {
    /// Set the scratch root.
    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Set the scratch prefix.
    pub fn scratch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scratch_prefix = prefix.into();
        self
    }

    /// Set the archive extensions.
    pub fn archive_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.archive_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// The directory scratch directories go into.
    pub fn resolved_scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Create a fresh, uniquely named scratch directory.
    pub fn allocate_scratch(&self) -> PoolResult<TempDir> {
        let root = self.resolved_scratch_root();
        tempfile::Builder::new()
            .prefix(&self.scratch_prefix)
            .tempdir_in(&root)
            .map_err(|source| PoolError::ScratchAllocationFailed { root, source })
    }

    /// Whether `path` is an archive file under this configuration.
    pub fn is_archive(&self, path: &Path) -> bool {
        archive::is_archive_file_with(path, &self.archive_extensions)
    }
}

/// One repository listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Identifier; defaults to the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub kind: SourceKind,
}

/// A declarative list of repositories to register.
///
/// ```json
/// {
///   "config": { "scratch_prefix": "analysis" },
///   "repositories": [
///     { "id": "linux", "path": "/srv/repos/linux" },
///     { "path": "/srv/siva/a1b2.siva", "kind": "archive" }
///   ]
/// }
/// ```
///
/// Relative paths are resolved against the manifest's directory when loaded
/// from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub config: PoolConfig,
    #[serde(default)]
    pub repositories: Vec<ManifestEntry>,
}

impl Manifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load a manifest file.
    pub fn load(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PoolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::from_json(&text).map_err(|source| PoolError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(dir) = path.parent() {
            for entry in &mut manifest.repositories {
                if entry.path.is_relative() {
                    entry.path = dir.join(&entry.path);
                }
            }
        }
        Ok(manifest)
    }
}
