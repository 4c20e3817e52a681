//! Archive file detection.
//!
//! Extension matching is tried first (cheap, no I/O). Files without a known
//! extension are sniffed: the trailing footer must point at an index that
//! starts with the siva signature.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::archive::format::{FOOTER_LEN, INDEX_SIGNATURE, INDEX_VERSION};

/// Extension of siva files.
pub const DEFAULT_EXTENSION: &str = "siva";

/// Case-insensitive extension match against `extensions` (without dots).
pub fn has_archive_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(ext))
}

/// Check the trailing footer of a file for a siva index.
///
/// Any I/O failure counts as "not an archive".
pub fn sniff_archive(path: &Path) -> bool {
    sniff(path).unwrap_or(false)
}

fn sniff(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let len = file.seek(SeekFrom::End(0))?;
    if len < FOOTER_LEN + 4 {
        return Ok(false);
    }

    let mut footer = [0u8; FOOTER_LEN as usize];
    file.seek(SeekFrom::Start(len - FOOTER_LEN))?;
    file.read_exact(&mut footer)?;

    let mut index_size = [0u8; 8];
    index_size.copy_from_slice(&footer[4..12]);
    let index_size = u64::from_be_bytes(index_size);
    if index_size < 4 || index_size > len - FOOTER_LEN {
        return Ok(false);
    }

    let mut header = [0u8; 4];
    file.seek(SeekFrom::Start(len - FOOTER_LEN - index_size))?;
    file.read_exact(&mut header)?;
    Ok(&header[..3] == INDEX_SIGNATURE && header[3] == INDEX_VERSION)
}

/// Whether `path` is a regular file holding a siva archive.
pub fn is_archive_file(path: impl AsRef<Path>) -> bool {
    is_archive_file_with(path.as_ref(), &[DEFAULT_EXTENSION])
}

/// Like [`is_archive_file`] with a custom extension list.
pub fn is_archive_file_with<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    if !path.is_file() {
        return false;
    }
    has_archive_extension(path, extensions) || sniff_archive(path)
}
