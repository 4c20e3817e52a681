//! Archive layer error types

use std::path::PathBuf;

use thiserror::Error;

/// errors raised while reading, writing or staging a siva archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// the index does not start with the siva signature
    #[error("invalid index signature at offset {offset}")]
    InvalidSignature { offset: u64 },

    /// the index was written by an unknown format version
    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u8),

    /// stored and computed checksums differ
    #[error("checksum mismatch for {what}: expected {expected:#010x}, found {found:#010x}")]
    ChecksumMismatch {
        what: String,
        expected: u32,
        found: u32,
    },

    /// a size or offset field points outside the file
    #[error("truncated archive: {0}")]
    Truncated(String),

    /// an entry name is absolute, empty or escapes the archive root
    #[error("invalid entry name: {0:?}")]
    InvalidEntryName(String),

    /// the archive path has no file name component
    #[error("invalid archive path: {0}")]
    InvalidPath(PathBuf),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// check if the archive bytes themselves are malformed
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            ArchiveError::InvalidSignature { .. }
                | ArchiveError::UnsupportedVersion(_)
                | ArchiveError::ChecksumMismatch { .. }
                | ArchiveError::Truncated(_)
        )
    }
}

/// result type alias for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
