//! Iteration over a pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::PoolResult;
use super::pool::RepositoryPool;
use crate::storage::Repository;

/// Cursor over a pool's registration order.
///
/// `next` takes `&self`, so one iterator can be shared by several workers:
/// each call claims the next position with a fetch-and-add, which hands every
/// position to exactly one caller. Independent iterators over the same pool do
/// not share a position.
#[derive(Debug)]
pub struct PoolIterator<'pool> {
    pool: &'pool RepositoryPool,
    position: AtomicUsize,
}

impl<'pool> PoolIterator<'pool> {
    pub(crate) fn new(pool: &'pool RepositoryPool) -> Self {
        Self {
            pool,
            position: AtomicUsize::new(0),
        }
    }

    /// Open the repository at the next position.
    ///
    /// Returns `Ok(None)` once every position has been handed out. An open
    /// failure only concerns its own position; calling `next` again moves on.
    pub fn next(&self) -> PoolResult<Option<Repository>> {
        let pos = self.position.fetch_add(1, Ordering::Relaxed);
        self.pool.lookup_by_position(pos)
    }

    /// Next position to be handed out.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    /// The pool being iterated.
    pub fn pool(&self) -> &'pool RepositoryPool {
        self.pool
    }

    /// Release the iterator. Nothing is held beyond the position counter.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use std::sync::Mutex;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_iterates_in_order() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 9, false);

        let mut pool = RepositoryPool::new();
        pool.register_plain_with_id("0", dir.path()).unwrap();
        pool.register_plain_with_id("1", dir.path()).unwrap();

        let iter = pool.iter();
        let mut count = 0;
        while let Some(repo) = iter.next().unwrap() {
            assert_eq!(repo.id(), count.to_string());
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(iter.next().unwrap().is_none());
        iter.close();
    }

    #[test]
    fn test_independent_iterators() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 1, true);

        let mut pool = RepositoryPool::new();
        pool.register_plain_with_id("a", dir.path()).unwrap();
        pool.register_plain_with_id("b", dir.path()).unwrap();

        let first = pool.iter();
        let second = pool.iter();
        assert_eq!(first.next().unwrap().unwrap().id(), "a");
        assert_eq!(first.next().unwrap().unwrap().id(), "b");
        assert_eq!(second.next().unwrap().unwrap().id(), "a");
        assert_eq!(first.position(), 2);
        assert_eq!(second.position(), 1);
    }

    #[test]
    fn test_open_failure_does_not_stop_iteration() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 1, false);

        let mut pool = RepositoryPool::new();
        pool.register_plain_with_id("good-1", dir.path()).unwrap();
        pool.register_archive_with_id("broken", "/no/such/archive.siva")
            .unwrap();
        pool.register_plain_with_id("good-2", dir.path()).unwrap();

        let iter = pool.iter();
        let mut opened = Vec::new();
        let mut failed = 0;
        loop {
            match iter.next() {
                Ok(Some(repo)) => opened.push(repo.id().to_string()),
                Ok(None) => break,
                Err(e) => {
                    assert!(e.is_open_failure());
                    failed += 1;
                }
            }
        }
        assert_eq!(opened, vec!["good-1", "good-2"]);
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_concurrent_next_partitions_positions() {
        let dir = TempDir::new().unwrap();
        test_support::init_repo_with_commits(dir.path(), 1, true);

        let n = 40;
        let mut pool = RepositoryPool::new();
        for i in 0..n {
            pool.register_plain_with_id(format!("{i:02}"), dir.path())
                .unwrap();
        }

        let iter = pool.iter();
        let seen = Mutex::new(Vec::new());
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let mut mine = Vec::new();
                    while let Some(repo) = iter.next().unwrap() {
                        mine.push(repo.id().to_string());
                    }
                    // exhausted stays exhausted
                    assert!(iter.next().unwrap().is_none());
                    seen.lock().unwrap().extend(mine);
                });
            }
        });

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        let expected: Vec<_> = (0..n).map(|i| format!("{i:02}")).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_iterator_over_empty_pool() {
        let pool = RepositoryPool::new();
        let iter = pool.iter();
        assert!(iter.next().unwrap().is_none());
        assert_eq!(iter.pool().len(), 0);
    }
}
