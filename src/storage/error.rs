//! Storage layer error types
//!
//! All errors that can occur while opening or reading a git repository are
//! defined here. We use `thiserror` for ergonomic error definition.

use std::path::PathBuf;

use thiserror::Error;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// the path does not hold valid repository metadata
    #[error("not a git repository: {path}")]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// the path is expected to be a directory but is not
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// a relative path escapes the filesystem root
    #[error("path escapes the filesystem root: {0}")]
    PathOutsideRoot(PathBuf),

    /// the handle was built without a backing repository
    #[error("repository handle {0} has no backing git repository")]
    Detached(String),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// repo is empty (no commits)
    #[error("repository is empty: no commits found")]
    EmptyRepository,

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// a commit carries a timestamp chrono cannot represent
    #[error("commit {commit} has an out of range timestamp: {seconds}")]
    InvalidTimestamp { commit: String, seconds: i64 },
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::CommitNotFound(_) | StorageError::EmptyRepository
        )
    }

    /// check if this error means the location holds no usable repository
    pub fn is_not_repository(&self) -> bool {
        matches!(
            self,
            StorageError::NotARepository { .. } | StorageError::NotADirectory(_)
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
