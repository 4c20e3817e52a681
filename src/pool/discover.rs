//! Registering every repository found under a directory.

use std::path::Path;

use log::{debug, info};
use walkdir::WalkDir;

use super::error::PoolResult;
use super::pool::RepositoryPool;

/// Whether `dir` holds a git repository: a working tree with `.git`, or a
/// bare repository.
pub fn is_git_directory(dir: &Path) -> bool {
    dir.join(".git").exists() || (dir.join("HEAD").is_file() && dir.join("objects").is_dir())
}

impl RepositoryPool {
    /// Walk `root` and register every repository found.
    ///
    /// Archive files are registered as archives. Git directories are
    /// registered as plain repositories and not descended into. Entries are
    /// visited in file name order, so the registration order is stable.
    /// Returns the number of repositories registered.
    pub fn discover(&mut self, root: impl AsRef<Path>) -> PoolResult<usize> {
        let root = root.as_ref();
        let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
        let mut registered = 0;

        loop {
            let entry = match walker.next() {
                None => break,
                Some(entry) => entry?,
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                if is_git_directory(path) {
                    self.register_plain(path)?;
                    registered += 1;
                    walker.skip_current_dir();
                }
            } else if entry.file_type().is_file() && self.config().is_archive(path) {
                self.register_archive(path)?;
                registered += 1;
            } else {
                debug!("discovery skipped {}", path.display());
            }
        }

        info!(
            "discovered {} repositories under {}",
            registered,
            root.display()
        );
        Ok(registered)
    }
}
