//! siva archive support.
//!
//! An archive-backed repository is a whole git directory packed into one
//! siva file. To use it, the pool:
//!
//! 1. reads the archive from its base directory (the directory holding the
//!    file), never opening the file for writing;
//! 2. stages the contents into a fresh scratch directory;
//! 3. opens git over the scratch directory.
//!
//! Writes made by git (locks, temporary files, new refs) land in the scratch
//! directory and disappear with it.

mod detect;
mod error;
mod format;
mod stage;

pub use detect::{
    has_archive_extension, is_archive_file, is_archive_file_with, sniff_archive,
    DEFAULT_EXTENSION,
};
pub use error::{ArchiveError, ArchiveResult};
pub use format::{crc32, ArchiveReader, ArchiveWriter, IndexEntry, FLAG_DELETED};
pub use stage::{open_as_filesystem, pack_directory, stage_into};
