//!  Commit enumeration and history traversal
//!
//! the pool hands out repositories to analysis code that mostly wants to look
//! at commits. This module provides:
//! - enumeration of every commit object stored in the object database
//! - history walking from a starting commit
//! - a lazy iterator that decodes commits one at a time
//!
//! Object ids are collected up front while the repository lock is held; the
//! commits themselves are decoded on demand so a caller can stop early.

use std::vec;

use chrono::{DateTime, TimeZone, Utc};
use git2::{ObjectType, Repository, Sort};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::repository::GitRepository;
use crate::storage::types::{CommitId, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> StorageResult<Self> {
        let author = commit.author();
        let seconds = commit.time().seconds();
        let timestamp = Utc.timestamp_opt(seconds, 0).single().ok_or_else(|| {
            StorageError::InvalidTimestamp {
                commit: commit.id().to_string(),
                seconds,
            }
        })?;

        Ok(Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        })
    }

    /// check if this is a merge commit (has multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    CommitInfo::from_git2(&commit)
}

/// ids of every commit object in the object database, reachable or not
///
/// Loose and packed objects are both visited. The result is sorted so two
/// enumerations of the same repository yield the same order.
pub fn commit_object_ids(repo: &Repository) -> StorageResult<Vec<CommitId>> {
    let odb = repo.odb()?;
    let mut oids = Vec::new();
    odb.foreach(|oid| {
        oids.push(*oid);
        true
    })?;

    let mut ids = Vec::new();
    for oid in oids {
        let (_, kind) = odb.read_header(oid)?;
        if kind == ObjectType::Commit {
            ids.push(CommitId::new(oid));
        }
    }

    // a packed object may also exist loose
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// ids of the commits reachable from `start`, newest first
pub fn history_ids(repo: &Repository, start: CommitId) -> StorageResult<Vec<CommitId>> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push(start.raw())?;
    revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

    revwalk
        .map(|oid| oid.map(CommitId::new).map_err(StorageError::Git))
        .collect()
}

/// lazy iterator over a fixed set of commits
///
/// Each step takes the repository lock just long enough to decode one commit.
pub struct CommitIter {
    repo: GitRepository,
    ids: vec::IntoIter<CommitId>,
}

impl CommitIter {
    pub(crate) fn new(repo: GitRepository, ids: Vec<CommitId>) -> Self {
        Self {
            repo,
            ids: ids.into_iter(),
        }
    }
}

impl Iterator for CommitIter {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(self.repo.get_commit(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for CommitIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use tempfile::TempDir;

    #[test]
    fn test_commit_object_ids_counts_commits_only() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 4, false);
        let repo = Repository::open(dir.path()).unwrap();

        let ids = commit_object_ids(&repo).unwrap();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_commit_object_ids_include_unreachable() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 3, true);
        let repo = Repository::open(dir.path()).unwrap();

        // dangling commit that no ref points to
        let sig = git2::Signature::now("Dangling", "dangling@repopool").unwrap();
        let tree_id = repo.treebuilder(None).unwrap().write().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(None, &sig, &sig, "dangling", &tree, &[]).unwrap();

        assert_eq!(commit_object_ids(&repo).unwrap().len(), 4);

        let head = CommitId::new(repo.head().unwrap().target().unwrap());
        assert_eq!(history_ids(&repo, head).unwrap().len(), 3);
    }

    #[test]
    fn test_history_is_newest_first() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 5, false);
        let repo = Repository::open(dir.path()).unwrap();

        let head = CommitId::new(repo.head().unwrap().target().unwrap());
        let ids = history_ids(&repo, head).unwrap();
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], head);

        let first = get_commit(&repo, ids[0]).unwrap();
        assert_eq!(first.summary(), "commit 4");
        assert_eq!(first.first_parent(), Some(ids[1]));
        assert!(!first.is_merge());

        let root = get_commit(&repo, ids[4]).unwrap();
        assert!(root.parent_ids.is_empty());
    }

    #[test]
    fn test_get_commit_missing() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 1, true);
        let repo = Repository::open(dir.path()).unwrap();

        let missing = CommitId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
        let err = get_commit(&repo, missing).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_out_of_range_timestamp_is_an_error() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();

        // far past the last second chrono can represent
        let when = git2::Time::new(1_000_000_000_000_000, 0);
        let sig = git2::Signature::new("Future", "future@repopool", &when).unwrap();
        let tree_id = repo.treebuilder(None).unwrap().write().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let oid = repo.commit(None, &sig, &sig, "future", &tree, &[]).unwrap();

        let err = get_commit(&repo, CommitId::new(oid)).unwrap_err();
        assert!(matches!(
            err,
            StorageError::InvalidTimestamp { seconds: 1_000_000_000_000_000, .. }
        ));
        assert!(!err.is_not_found());
    }
}
