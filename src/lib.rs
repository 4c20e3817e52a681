//! RepoPool - a pool of git repositories
//!
//! This crate lets an analysis engine treat many independently stored git
//! repositories as one addressable, iterable collection. A repository can be
//! a plain directory on disk or packed inside a single siva archive file; the
//! pool hides the difference behind a stable identifier.
//!
//! # Example
//!
//! ```no_run
//! use repopool::pool::RepositoryPool;
//!
//! let mut pool = RepositoryPool::new();
//! pool.register_plain("/srv/repos/linux").unwrap();
//! pool.register_archive("/srv/siva/a1b2c3.siva").unwrap();
//!
//! let iter = pool.iter();
//! while let Some(repo) = iter.next().unwrap() {
//!     println!("{}: {} commits", repo.id(), repo.commit_count().unwrap());
//! }
//! ```

pub mod archive;
pub mod pool;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
