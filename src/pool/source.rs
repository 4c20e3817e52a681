//! Repository sources.
//!
//! A source records where a repository lives and how to open it. Nothing is
//! touched on disk until [`RepositorySource::open`] or
//! [`RepositorySource::filesystem`] is called, and every call opens the
//! storage again from scratch.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::config::PoolConfig;
use super::error::{OpenError, PoolError, PoolResult};
use crate::archive::{self, ArchiveError};
use crate::storage::{GitRepository, RepoFilesystem, Repository, StorageError};

/// How a repository is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A working tree or bare repository directory on the host.
    #[default]
    Plain,
    /// A repository packed into a siva file.
    Archive,
}

/// Where a registered repository lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySource {
    id: String,
    path: PathBuf,
    kind: SourceKind,
}

impl RepositorySource {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            kind,
        }
    }

    /// Plain source whose identifier is its path.
    pub fn plain(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(path.display().to_string(), path, SourceKind::Plain)
    }

    /// Archive source whose identifier is its path.
    pub fn archive(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(path.display().to_string(), path, SourceKind::Archive)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    fn cannot_open(&self, source: impl Into<OpenError>) -> PoolError {
        PoolError::CannotOpen {
            path: self.path.clone(),
            source: source.into(),
        }
    }

    /// Open the repository.
    ///
    /// Archive sources get a new scratch directory on every call; it is
    /// removed when the returned handle (and its clones) are dropped.
    pub fn open(&self, config: &PoolConfig) -> PoolResult<Repository> {
        let fs = self.filesystem(config)?;
        let git = GitRepository::open_filesystem(fs).map_err(|e| self.cannot_open(e))?;
        debug!("opened repository {} from {}", self.id, self.path.display());
        Ok(Repository::new(self.id.clone(), Some(git)))
    }

    /// Filesystem view of the repository location.
    ///
    /// For archives this stages the archive into a new scratch directory
    /// owned by the view.
    pub fn filesystem(&self, config: &PoolConfig) -> PoolResult<RepoFilesystem> {
        match self.kind {
            SourceKind::Plain => {
                if !self.path.is_dir() {
                    return Err(self.cannot_open(StorageError::NotADirectory(self.path.clone())));
                }
                Ok(RepoFilesystem::new(&self.path))
            }
            SourceKind::Archive => {
                let (base, name) = self.archive_location()?;
                let scratch = config.allocate_scratch()?;
                archive::open_as_filesystem(base, name, scratch).map_err(|e| self.cannot_open(e))
            }
        }
    }

    /// Split an archive path into its base directory and file name.
    fn archive_location(&self) -> PoolResult<(&Path, &str)> {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| self.cannot_open(ArchiveError::InvalidPath(self.path.clone())))?;
        let base = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok((base, name))
    }
}
