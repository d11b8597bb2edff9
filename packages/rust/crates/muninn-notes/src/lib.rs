//! muninn-notes - incremental markdown document cache and backlink index.
//!
//! Module layout:
//! - `models`: document, tree and node types
//! - `parser`: `comrak`-backed markdown parser with positional node ids
//! - `cache`: persistent LRU/TTL parse cache with JSON snapshots
//! - `store`: directory scan that reuses or refreshes cached parses
//! - `backlinks`: reference resolution and backlink queries
//! - `notebook`: scan/query/store facade for one notes root
//!
//! # Examples
//!
//! ```no_run
//! use muninn_notes::{CacheConfig, Notebook};
//! use std::path::Path;
//!
//! let mut notebook = Notebook::open(Path::new("notes"), CacheConfig::new("cache.json"))?;
//! notebook.scan();
//! for group in notebook.backlinks("b.md") {
//!     println!("{} -> {} reference(s)", group.source, group.backlinks.len());
//! }
//! notebook.store()?;
//! # Ok::<(), muninn_notes::NotesError>(())
//! ```

pub mod backlinks;
pub mod cache;
mod error;
pub mod models;
pub mod notebook;
pub mod parser;
pub mod store;

pub use backlinks::{
    Backlink, BacklinkGroup, BacklinkIndex, ResolveOptions, find_backlinks,
    normalize_relative_path, resolve_reference,
};
pub use cache::{
    CACHE_SNAPSHOT_SCHEMA_VERSION, CacheConfig, CacheEntry, DEFAULT_CACHE_TTL, PersistentCache,
};
pub use error::{NotesError, Result};
pub use models::{
    Document, DocumentMap, DocumentTree, ModTime, Node, NodeKind, NodeRef, ParsedDocument, Point,
    Position,
};
pub use notebook::Notebook;
pub use parser::{DocumentParser, MarkdownParser, assign_ids};
pub use store::{
    DEFAULT_DOCUMENT_PATTERN, DocumentStore, ScanIssue, ScanOptions, ScanReport, ScanStats,
};
