//! The repository pool.
//!
//! Maps identifiers to sources and remembers registration order. The pool is
//! append-only: sources can be registered but never removed. Registration
//! needs `&mut self`, so it cannot overlap with lookups or iterators, which
//! only borrow the pool.

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use super::config::{Manifest, PoolConfig};
use super::error::{PoolError, PoolResult};
use super::iter::PoolIterator;
use super::source::{RepositorySource, SourceKind};
use crate::storage::Repository;

/// A registry of git repositories with a stable insertion order.
#[derive(Debug, Default)]
pub struct RepositoryPool {
    sources: HashMap<String, RepositorySource>,
    order: Vec<String>,
    config: PoolConfig,
}

impl RepositoryPool {
    /// Create an empty pool with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty pool with a custom configuration.
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Build a pool from a manifest file, using the manifest's configuration.
    pub fn from_manifest(path: impl AsRef<Path>) -> PoolResult<Self> {
        let manifest = Manifest::load(path)?;
        let mut pool = Self::with_config(manifest.config.clone());
        pool.register_manifest(&manifest)?;
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of registered repositories.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// The source registered under `id`.
    pub fn source(&self, id: &str) -> Option<&RepositorySource> {
        self.sources.get(id)
    }

    /// Register a source.
    ///
    /// The path is not checked; problems show up when the repository is
    /// opened. A duplicate identifier leaves the pool unchanged.
    pub fn register(&mut self, source: RepositorySource) -> PoolResult<()> {
        if source.id().is_empty() {
            return Err(PoolError::EmptyIdentifier);
        }
        if let Some(existing) = self.sources.get(source.id()) {
            return Err(PoolError::AlreadyRegistered {
                id: source.id().to_string(),
                path: existing.path().to_path_buf(),
            });
        }

        debug!(
            "registered {:?} repository {} at {}",
            source.kind(),
            source.id(),
            source.path().display()
        );
        self.order.push(source.id().to_string());
        self.sources.insert(source.id().to_string(), source);
        Ok(())
    }

    /// Register a plain repository using its path as identifier.
    pub fn register_plain(&mut self, path: impl AsRef<Path>) -> PoolResult<()> {
        self.register(RepositorySource::plain(path.as_ref()))
    }

    /// Register a plain repository under `id`.
    pub fn register_plain_with_id(
        &mut self,
        id: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> PoolResult<()> {
        self.register(RepositorySource::new(id, path.as_ref(), SourceKind::Plain))
    }

    /// Register an archive using its path as identifier.
    pub fn register_archive(&mut self, path: impl AsRef<Path>) -> PoolResult<()> {
        self.register(RepositorySource::archive(path.as_ref()))
    }

    /// Register an archive under `id`.
    pub fn register_archive_with_id(
        &mut self,
        id: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> PoolResult<()> {
        self.register(RepositorySource::new(id, path.as_ref(), SourceKind::Archive))
    }

    /// Register every manifest entry in order, stopping at the first failure.
    pub fn register_manifest(&mut self, manifest: &Manifest) -> PoolResult<()> {
        for entry in &manifest.repositories {
            let id = entry
                .id
                .clone()
                .unwrap_or_else(|| entry.path.display().to_string());
            self.register(RepositorySource::new(id, &entry.path, entry.kind))?;
        }
        Ok(())
    }

    /// Open the repository registered under `id`.
    pub fn lookup_by_id(&self, id: &str) -> PoolResult<Repository> {
        let source = self
            .sources
            .get(id)
            .ok_or_else(|| PoolError::NotFound(id.to_string()))?;
        source.open(&self.config)
    }

    /// Open the repository registered at position `pos`.
    ///
    /// Returns `Ok(None)` once `pos` is past the last registration. An open
    /// failure at a valid position is returned as an error.
    pub fn lookup_by_position(&self, pos: usize) -> PoolResult<Option<Repository>> {
        let Some(id) = self.order.get(pos) else {
            return Ok(None);
        };
        self.lookup_by_id(id).map(Some)
    }

    /// A new iterator starting at the first registered repository.
    pub fn iter(&self) -> PoolIterator<'_> {
        PoolIterator::new(self)
    }
}
