//! storage layer for RepoPool
//!
//! this module is the only place that talks to git2. The pool and the
//! archive layer hand it a directory (a host path or a staged scratch
//! directory) and get back a [`GitRepository`].
//!
//! # Usage
//!
//! ```ignore
//! use repopool::storage::{GitRepository, Repository};
//!
//! let git = GitRepository::open("./some/repo")?;
//! let repo = Repository::new("some-repo", Some(git));
//!
//! for commit in repo.commit_objects()? {
//!     println!("{}", commit?.summary());
//! }
//! ```

mod commit;
mod error;
mod fs;
mod repository;
mod types;

// Re-export public API
pub use commit::{CommitInfo, CommitIter};
pub use error::{StorageError, StorageResult};
pub use fs::RepoFilesystem;
pub use repository::{GitRepository, Repository};
pub use types::{CommitId, TreeId};
