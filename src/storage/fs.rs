//! Rooted filesystem view over a repository location.
//!
//! A plain repository exposes its own directory. An archive-backed repository
//! exposes the scratch directory its archive was staged into; in that case the
//! view also owns the scratch directory and removes it when the last clone is
//! dropped.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::storage::error::{StorageError, StorageResult};

/// A directory tree addressed by paths relative to its root.
#[derive(Debug, Clone)]
pub struct RepoFilesystem {
    root: PathBuf,
    scratch: Option<Arc<TempDir>>,
}

impl RepoFilesystem {
    /// View over an existing host directory. Nothing is owned.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scratch: None,
        }
    }

    /// View over a scratch directory. The directory lives as long as the view
    /// (or any clone of it).
    pub fn scratch(dir: TempDir) -> Self {
        Self {
            root: dir.path().to_path_buf(),
            scratch: Some(Arc::new(dir)),
        }
    }

    /// Root directory on the host.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this view owns a scratch overlay rather than a host directory.
    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    /// Resolve a relative path against the root.
    ///
    /// Absolute paths and `..` components are rejected.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> StorageResult<PathBuf> {
        let rel = rel.as_ref();
        let mut out = self.root.clone();
        for component in rel.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::PathOutsideRoot(rel.to_path_buf()));
                }
            }
        }
        Ok(out)
    }

    /// Check whether a relative path exists.
    pub fn exists(&self, rel: impl AsRef<Path>) -> bool {
        self.resolve(rel).map(|p| p.exists()).unwrap_or(false)
    }

    /// Read a whole file.
    pub fn read(&self, rel: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        Ok(fs::read(self.resolve(rel)?)?)
    }

    /// Write a whole file, creating parent directories as needed.
    pub fn write(&self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> StorageResult<()> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Create a directory and its parents.
    pub fn create_dir_all(&self, rel: impl AsRef<Path>) -> StorageResult<()> {
        fs::create_dir_all(self.resolve(rel)?)?;
        Ok(())
    }

    /// Names of the entries of a directory, sorted.
    pub fn read_dir(&self, rel: impl AsRef<Path>) -> StorageResult<Vec<String>> {
        let path = self.resolve(rel)?;
        if !path.is_dir() {
            return Err(StorageError::NotADirectory(path));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
