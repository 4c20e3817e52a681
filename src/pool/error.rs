//! Pool error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::storage::StorageError;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Why a registered repository could not be opened.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Pool errors.
///
/// Running out of positions is not an error: positional lookups and
/// iterators report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("repository identifier must not be empty")]
    EmptyIdentifier,

    #[error("the repository is already registered: {id} ({path})")]
    AlreadyRegistered { id: String, path: PathBuf },

    #[error("repository id {0} not found in the pool")]
    NotFound(String),

    #[error("the repository could not be opened: {path}: {source}")]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: OpenError,
    },

    #[error("cannot allocate scratch directory in {root}: {source}")]
    ScratchAllocationFailed {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl PoolError {
    /// check if this error indicates the identifier is unknown
    pub fn is_not_found(&self) -> bool {
        matches!(self, PoolError::NotFound(_))
    }

    /// check if this error is confined to a single lookup
    ///
    /// Such failures leave the pool untouched; iteration can move on to the
    /// next position.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            PoolError::CannotOpen { .. } | PoolError::ScratchAllocationFailed { .. }
        )
    }
}
