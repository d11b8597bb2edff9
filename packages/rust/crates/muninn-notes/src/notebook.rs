//! One notes directory plus its cache: scan, query, persist.

use std::path::Path;

use crate::backlinks::{BacklinkGroup, BacklinkIndex, ResolveOptions, normalize_relative_path};
use crate::cache::{CacheConfig, PersistentCache};
use crate::error::Result;
use crate::models::DocumentMap;
use crate::parser::{DocumentParser, MarkdownParser};
use crate::store::{DocumentStore, ScanOptions, ScanReport};

/// Runs "load cache, scan fully, then query, then store".
///
/// The mapping from the last [`Notebook::scan`] is the only thing queries
/// see; a scan in progress is never observable.
#[derive(Debug)]
pub struct Notebook<P = MarkdownParser> {
    store: DocumentStore<P>,
    cache: PersistentCache,
    documents: DocumentMap,
    resolve: ResolveOptions,
}

impl Notebook<MarkdownParser> {
    /// Open `root` with the markdown parser and default scan options.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotesError::InvalidRoot`] when `root` is not a directory.
    pub fn open(root: &Path, cache: CacheConfig) -> Result<Self> {
        Self::open_with(root, ScanOptions::default(), cache, MarkdownParser)
    }
}

impl<P: DocumentParser> Notebook<P> {
    /// Open `root` with explicit options and parser. Loads the cache snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotesError::InvalidRoot`] or [`crate::NotesError::Pattern`].
    pub fn open_with(
        root: &Path,
        options: ScanOptions,
        cache: CacheConfig,
        parser: P,
    ) -> Result<Self> {
        let store = DocumentStore::with_options(root, options, parser)?;
        Ok(Self {
            store,
            cache: PersistentCache::open(cache),
            documents: DocumentMap::new(),
            resolve: ResolveOptions::default(),
        })
    }

    /// Override reference resolution for backlink queries.
    #[must_use]
    pub fn with_resolve_options(mut self, resolve: ResolveOptions) -> Self {
        self.resolve = resolve;
        self
    }

    /// Canonical notes root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Underlying cache.
    #[must_use]
    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    /// Mapping published by the last scan.
    #[must_use]
    pub fn documents(&self) -> &DocumentMap {
        &self.documents
    }

    /// Scan the root and publish the new mapping.
    ///
    /// The returned report's `documents` is a copy of what was published.
    pub fn scan(&mut self) -> ScanReport {
        let report = self.store.scan(&self.cache);
        self.documents.clone_from(&report.documents);
        report
    }

    /// Root-relative form of a user-supplied file path.
    ///
    /// Absolute paths (canonicalized when they exist) lose the root prefix;
    /// relative paths are taken as root-relative.
    #[must_use]
    pub fn relative_target(&self, file: &Path) -> Option<String> {
        if file.is_absolute() {
            let file = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
            let relative = file.strip_prefix(self.root()).ok()?;
            return normalize_relative_path(&relative.to_string_lossy());
        }
        normalize_relative_path(&file.to_string_lossy())
    }

    /// Backlinks to `target` in the published mapping.
    #[must_use]
    pub fn backlinks(&self, target: &str) -> Vec<BacklinkGroup> {
        BacklinkIndex::new(&self.documents)
            .with_options(self.resolve)
            .find(target)
    }

    /// Persist the cache snapshot.
    ///
    /// # Errors
    ///
    /// Propagates snapshot encode/write failures.
    pub fn store(&self) -> Result<()> {
        self.cache.store()
    }

    /// Delete the cache snapshot; the next run starts cold.
    ///
    /// # Errors
    ///
    /// Propagates failures removing an existing snapshot.
    pub fn clear_cache(&self) -> Result<bool> {
        self.cache.clear()
    }
}
