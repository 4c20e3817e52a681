//!   Core Git repository wrapper and the pool's repository handle.
//!
//!  `GitRepository` wraps `git2::Repository` with thread-safe access and
//!  provides the read operations analysis code needs. `Repository` pairs it
//!  with the identifier the caller registered it under; it is the unit the
//!  pool hands out.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::commit::{self, CommitInfo, CommitIter};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::fs::RepoFilesystem;
use crate::storage::types::CommitId;

/// The main Git repository wrapper.
///
/// This provides thread-safe access to all Git operations.
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    // dropped before `fs` so libgit2 lets go of the scratch files first
    repo: Mutex<git2::Repository>,
    fs: RepoFilesystem,
}

impl GitRepository {
    /// Open an existing repository on the host filesystem.
    ///
    /// `path` may be a working tree or a bare repository directory.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_filesystem(RepoFilesystem::new(path.as_ref()))
    }

    /// Open the repository rooted at a filesystem view.
    ///
    /// If the view owns a scratch directory, the repository keeps it alive.
    pub fn open_filesystem(fs: RepoFilesystem) -> StorageResult<Self> {
        let repo = git2::Repository::open(fs.root()).map_err(|source| {
            StorageError::NotARepository {
                path: fs.root().to_path_buf(),
                source,
            }
        })?;

        Ok(Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                fs,
            }),
        })
    }

    /// Get the repository root path.
    pub fn path(&self) -> &Path {
        self.inner.fs.root()
    }

    /// Filesystem view the repository was opened over.
    pub fn filesystem(&self) -> &RepoFilesystem {
        &self.inner.fs
    }

    /// Execute a function with exclusive access to the repository.
    ///
    /// The lock is not reentrant. Calling `head`, `commit_objects`,
    /// `get_commit` or any other locking method of the same handle (or a
    /// clone of it) inside `f` deadlocks; use the `&git2::Repository` passed
    /// to `f` instead.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&git2::Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    /// Whether the repository has no working tree.
    pub fn is_bare(&self) -> bool {
        self.inner.repo.lock().is_bare()
    }

    /// Get the commit HEAD points to.
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(|repo| {
            let head = repo.head().map_err(|e| {
                if e.code() == git2::ErrorCode::UnbornBranch {
                    StorageError::EmptyRepository
                } else {
                    StorageError::Git(e)
                }
            })?;

            let commit = head.peel_to_commit()?;
            Ok(CommitId::new(commit.id()))
        })
    }

    /// Get information about a commit.
    pub fn get_commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// Every commit object stored in the repository.
    ///
    /// Each call starts a fresh enumeration.
    pub fn commit_objects(&self) -> StorageResult<CommitIter> {
        let ids = self.with_repo(commit::commit_object_ids)?;
        Ok(CommitIter::new(self.clone(), ids))
    }

    /// Commits reachable from `from`, newest first.
    pub fn history(&self, from: CommitId) -> StorageResult<CommitIter> {
        let ids = self.with_repo(|repo| commit::history_ids(repo, from))?;
        Ok(CommitIter::new(self.clone(), ids))
    }
}

impl fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.path())
            .field("scratch", &self.inner.fs.is_scratch())
            .finish()
    }
}

/// A repository resolved from the pool.
///
/// Handles are built fresh on every lookup; two lookups of the same id give
/// two independent handles. `git` is `None` only for handles built by hand
/// (test doubles).
#[derive(Debug, Clone)]
pub struct Repository {
    id: String,
    git: Option<GitRepository>,
}

impl Repository {
    pub fn new(id: impl Into<String>, git: Option<GitRepository>) -> Self {
        Self { id: id.into(), git }
    }

    /// Identifier the repository was registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The backing repository, if any.
    pub fn git(&self) -> Option<&GitRepository> {
        self.git.as_ref()
    }

    fn require_git(&self) -> StorageResult<&GitRepository> {
        self.git
            .as_ref()
            .ok_or_else(|| StorageError::Detached(self.id.clone()))
    }

    /// Filesystem view of the repository.
    pub fn filesystem(&self) -> StorageResult<&RepoFilesystem> {
        Ok(self.require_git()?.filesystem())
    }

    /// See [`GitRepository::head`].
    pub fn head(&self) -> StorageResult<CommitId> {
        self.require_git()?.head()
    }

    /// See [`GitRepository::commit_objects`].
    pub fn commit_objects(&self) -> StorageResult<CommitIter> {
        self.require_git()?.commit_objects()
    }

    /// Number of commit objects in the repository.
    pub fn commit_count(&self) -> StorageResult<usize> {
        Ok(self.commit_objects()?.len())
    }

    /// See [`GitRepository::history`].
    pub fn history(&self, from: CommitId) -> StorageResult<CommitIter> {
        self.require_git()?.history(from)
    }
}
