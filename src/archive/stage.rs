//! Staging archives into a writable scratch directory, and packing
//! directories into archives.
//!
//! # Invariants
//! - The archive file is opened read-only; every write lands in scratch.
//! - Entry names are relative, `/`-separated and never escape the root.
//! - A failed staging drops the scratch directory, which removes it.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use log::{debug, warn};
use tempfile::{NamedTempFile, TempDir};
use walkdir::WalkDir;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::format::{ArchiveReader, ArchiveWriter};
use crate::storage::RepoFilesystem;

/// Turn an entry name into a relative path.
pub(crate) fn entry_path(name: &str) -> ArchiveResult<PathBuf> {
    if name.starts_with('/') || name.contains('\\') {
        return Err(ArchiveError::InvalidEntryName(name.to_string()));
    }

    let mut out = PathBuf::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(ArchiveError::InvalidEntryName(name.to_string())),
            part => out.push(part),
        }
    }

    // reject things like "C:" that parse as a prefix on windows
    let plain = out
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if out.as_os_str().is_empty() || !plain {
        return Err(ArchiveError::InvalidEntryName(name.to_string()));
    }
    Ok(out)
}

/// Open `name` inside `base` as a writable filesystem backed by `scratch`.
///
/// The archive contents are staged into the scratch directory, which the
/// returned view owns.
pub fn open_as_filesystem(
    base: &Path,
    name: &str,
    scratch: TempDir,
) -> ArchiveResult<RepoFilesystem> {
    let is_file_name = matches!(
        Path::new(name).components().collect::<Vec<_>>().as_slice(),
        [Component::Normal(_)]
    );
    if !is_file_name {
        return Err(ArchiveError::InvalidPath(base.join(name)));
    }

    let archive = base.join(name);
    let mut reader = ArchiveReader::open(&archive)?;
    let staged = stage_into(&mut reader, scratch.path())?;
    restore_git_dirs(scratch.path())?;

    debug!(
        "staged {} entries from {} into {}",
        staged,
        archive.display(),
        scratch.path().display()
    );
    Ok(RepoFilesystem::scratch(scratch))
}

/// Write every live entry of `reader` below `root`. Returns the entry count.
///
/// Permission bits are not restored.
pub fn stage_into<R: Read + Seek>(
    reader: &mut ArchiveReader<R>,
    root: &Path,
) -> ArchiveResult<usize> {
    let entries = reader.entries().to_vec();
    for entry in &entries {
        let path = root.join(entry_path(&entry.name)?);
        let contents = reader.read_entry(entry)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
    }
    Ok(entries.len())
}

/// Archives only carry files, so empty directories git insists on are lost.
fn restore_git_dirs(root: &Path) -> ArchiveResult<()> {
    let git_dir = if root.join("HEAD").is_file() {
        root.to_path_buf()
    } else if root.join(".git").join("HEAD").is_file() {
        root.join(".git")
    } else {
        return Ok(());
    };

    for dir in ["objects", "refs/heads", "refs/tags"] {
        fs::create_dir_all(git_dir.join(dir))?;
    }
    Ok(())
}

/// Pack every regular file below `src` into a new archive at `dest`.
///
/// Returns the number of files written. Symlinks are skipped. The archive is
/// written to a temporary file next to `dest` and only moved into place once
/// it is complete, so a failed pack leaves nothing at `dest`.
pub fn pack_directory(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> ArchiveResult<usize> {
    let src = fs::canonicalize(src.as_ref())?;
    let dest = dest.as_ref();
    let file_name = dest
        .file_name()
        .ok_or_else(|| ArchiveError::InvalidPath(dest.to_path_buf()))?;
    let dest_dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent)?,
        _ => std::env::current_dir()?,
    };
    let dest = dest_dir.join(file_name);

    let tmp = NamedTempFile::new_in(&dest_dir)?;
    let mut writer = ArchiveWriter::new(BufWriter::new(tmp.as_file()));

    for entry in WalkDir::new(&src).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        // the archive may be written inside the tree being packed
        if path == dest || path == tmp.path() {
            continue;
        }
        if entry.file_type().is_symlink() {
            warn!("skipping symlink {}", path.display());
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = path
            .strip_prefix(&src)
            .map_err(|_| ArchiveError::InvalidPath(path.to_path_buf()))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = entry.metadata().map_err(std::io::Error::from)?;
        let mod_time = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_nanos()).ok())
            .unwrap_or(0);

        writer.add_file(&name, file_mode(&metadata), mod_time, &fs::read(path)?)?;
    }

    let count = writer.len();
    writer.finish()?;
    tmp.persist(&dest).map_err(|e| ArchiveError::Io(e.error))?;
    debug!("packed {} files from {} into {}", count, src.display(), dest.display());
    Ok(count)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_path() {
        assert_eq!(entry_path("objects/ab/cd").unwrap(), PathBuf::from("objects/ab/cd"));
        assert_eq!(entry_path("./HEAD").unwrap(), PathBuf::from("HEAD"));
        assert!(entry_path("").is_err());
        assert!(entry_path("/etc/passwd").is_err());
        assert!(entry_path("refs/../../escape").is_err());
        assert!(entry_path("a\\b").is_err());
    }

    #[test]
    fn test_pack_and_stage() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("refs/heads")).unwrap();
        fs::write(src.path().join("HEAD"), b"ref: refs/heads/master\n").unwrap();
        fs::write(src.path().join("refs/heads/master"), b"0123\n").unwrap();

        let out = TempDir::new().unwrap();
        let archive = out.path().join("repo.siva");
        assert_eq!(pack_directory(src.path(), &archive).unwrap(), 2);

        let scratch = TempDir::new().unwrap();
        let fs = open_as_filesystem(out.path(), "repo.siva", scratch).unwrap();
        assert!(fs.is_scratch());
        assert_eq!(fs.read("refs/heads/master").unwrap(), b"0123\n");
        // git needs these even when empty
        assert!(fs.exists("objects"));
        assert!(fs.exists("refs/tags"));
    }

    #[test]
    fn test_pack_into_source_tree_skips_itself() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("out")).unwrap();
        fs::write(src.path().join("HEAD"), b"ref: refs/heads/master\n").unwrap();
        fs::write(src.path().join("out/old.siva"), b"stale").unwrap();

        // same file as src/out/repo.siva, spelled through a detour
        let dest = src.path().join("out/../out/./repo.siva");
        assert_eq!(pack_directory(src.path(), &dest).unwrap(), 2);

        let reader = ArchiveReader::open(src.path().join("out/repo.siva")).unwrap();
        let names: Vec<_> = reader.entries().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["HEAD".to_string(), "out/old.siva".to_string()]);

        // no leftover temporary files next to the archive
        let mut left: Vec<_> = fs::read_dir(src.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["old.siva".to_string(), "repo.siva".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_pack_leaves_no_archive() {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new().unwrap();
        let locked = src.path().join("locked");
        fs::write(&locked, b"secret").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            // running as root, permissions are not enforced
            return;
        }

        let out = TempDir::new().unwrap();
        let dest = out.path().join("repo.siva");
        assert!(pack_directory(src.path(), &dest).is_err());
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_open_removes_scratch() {
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("broken.siva"), b"garbage garbage garbage garbage").unwrap();

        let scratch = TempDir::new().unwrap();
        let scratch_path = scratch.path().to_path_buf();
        let err = open_as_filesystem(out.path(), "broken.siva", scratch).unwrap_err();
        assert!(err.is_corrupt());
        assert!(!scratch_path.exists());
    }

    #[test]
    fn test_name_must_be_a_file_name() {
        let out = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        assert!(matches!(
            open_as_filesystem(out.path(), "../x.siva", scratch),
            Err(ArchiveError::InvalidPath(_))
        ));
    }
}
