//! Fixture repositories for tests.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Repository, Signature, Time};
use tempfile::TempDir;

use crate::archive;

const BASE_TIME: i64 = 1_600_000_000;

fn signature(seconds: i64) -> Signature<'static> {
    Signature::new("RepoPool Test", "test@repopool", &Time::new(seconds, 0)).unwrap()
}

/// Create a repository at `path` whose HEAD has `commits` linear commits.
///
/// Commit `i` has the message `commit {i}` and all commits share one tree.
pub fn init_repo_with_commits(path: &Path, commits: usize, bare: bool) {
    fs::create_dir_all(path).unwrap();
    let repo = if bare {
        Repository::init_bare(path).unwrap()
    } else {
        Repository::init(path).unwrap()
    };

    let blob = repo.blob(b"fixture\n").unwrap();
    let mut builder = repo.treebuilder(None).unwrap();
    builder.insert("README", blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let mut parent: Option<git2::Commit<'_>> = None;
    for i in 0..commits {
        let sig = signature(BASE_TIME + i as i64);
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &sig, &sig, &format!("commit {i}"), &tree, &parents)
            .unwrap();
        parent = Some(repo.find_commit(oid).unwrap());
    }
}

/// Add one commit on top of HEAD.
pub fn add_commit(path: &Path, message: &str) {
    let repo = Repository::open(path).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    let blob = repo.blob(message.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(Some(&head.tree().unwrap())).unwrap();
    builder.insert("LATE", blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let sig = signature(BASE_TIME + 1_000_000);
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head])
        .unwrap();
}

/// Build a repository with `commits` commits and pack it into `dir/name`.
///
/// Bare repositories are packed at the archive root; working trees are packed
/// with their `.git` directory.
pub fn archive_with_commits(dir: &Path, name: &str, commits: usize, bare: bool) -> PathBuf {
    let src = TempDir::new().unwrap();
    init_repo_with_commits(src.path(), commits, bare);

    let dest = dir.join(name);
    archive::pack_directory(src.path(), &dest).unwrap();
    dest
}
