//! The repository pool.
//!
//! Sources are registered up front (by path, from a manifest or by
//! discovery) and opened lazily. Callers either look a repository up by id
//! or position, or share a [`PoolIterator`] between workers:
//!
//! ```no_run
//! use std::thread;
//! use repopool::pool::RepositoryPool;
//!
//! let mut pool = RepositoryPool::new();
//! pool.discover("/srv/repos").unwrap();
//!
//! let iter = pool.iter();
//! thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| loop {
//!             match iter.next() {
//!                 Ok(Some(repo)) => println!("{}", repo.id()),
//!                 Ok(None) => break,
//!                 Err(e) => eprintln!("{e}"),
//!             }
//!         });
//!     }
//! });
//! ```

mod config;
mod discover;
mod error;
mod iter;
mod pool;
mod source;

pub use config::{Manifest, ManifestEntry, PoolConfig};
pub use discover::is_git_directory;
pub use error::{OpenError, PoolError, PoolResult};
pub use iter::PoolIterator;
pub use pool::RepositoryPool;
pub use source::{RepositorySource, SourceKind};
