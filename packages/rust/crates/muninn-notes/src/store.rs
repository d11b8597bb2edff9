//! Document store: discover note files and reuse or refresh their parses.

use globset::{GlobBuilder, GlobMatcher};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

use crate::cache::PersistentCache;
use crate::error::{NotesError, Result};
use crate::models::{Document, DocumentMap, ModTime, ParsedDocument};
use crate::parser::DocumentParser;

/// Default document glob, relative to the root.
pub const DEFAULT_DOCUMENT_PATTERN: &str = "**/*.md";

/// File discovery options.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Glob matched against `/`-separated root-relative paths.
    pub pattern: String,
    /// Whether to skip hidden files and folders.
    pub skip_hidden: bool,
    /// Directory names to skip during discovery (ASCII case-insensitive).
    /// Empty by default.
    pub excluded_dirs: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_DOCUMENT_PATTERN.to_string(),
            skip_hidden: true,
            excluded_dirs: Vec::new(),
        }
    }
}

/// A file left out of the scan result, with the reason.
#[derive(Debug)]
pub struct ScanIssue {
    /// Root-relative path of the skipped file.
    pub relative_path: String,
    /// Why it was skipped.
    pub error: NotesError,
}

/// Outcome of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Relative path -> document.
    pub documents: DocumentMap,
    /// Files skipped because of I/O or parse failures.
    pub issues: Vec<ScanIssue>,
    /// Files read and parsed during this scan.
    pub reparsed: usize,
    /// Files served from the cache.
    pub reused: usize,
}

/// Serializable scan counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Documents in the mapping.
    pub documents: usize,
    /// Files parsed.
    pub reparsed: usize,
    /// Files reused from cache.
    pub reused: usize,
    /// `path: reason` for every skipped file.
    pub issues: Vec<String>,
}

impl ScanReport {
    /// Counters for reporting.
    #[must_use]
    pub fn stats(&self) -> ScanStats {
        ScanStats {
            documents: self.documents.len(),
            reparsed: self.reparsed,
            reused: self.reused,
            issues: self
                .issues
                .iter()
                .map(|issue| format!("{}: {}", issue.relative_path, issue.error))
                .collect(),
        }
    }
}

enum Loaded {
    Reused {
        key: String,
        absolute_path: PathBuf,
        cached: Arc<ParsedDocument>,
    },
    Parsed {
        key: String,
        absolute_path: PathBuf,
        parsed: ParsedDocument,
    },
}

/// Scans one root directory against a [`PersistentCache`].
///
/// Holds no per-scan state: every call to [`DocumentStore::scan`] returns a
/// fresh mapping.
#[derive(Debug)]
pub struct DocumentStore<P> {
    root: PathBuf,
    options: ScanOptions,
    matcher: GlobMatcher,
    parser: P,
}

impl<P: DocumentParser> DocumentStore<P> {
    /// Create a store for `root` with default options.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::InvalidRoot`] when `root` is not a directory.
    pub fn new(root: &Path, parser: P) -> Result<Self> {
        Self::with_options(root, ScanOptions::default(), parser)
    }

    /// Create a store with explicit discovery options.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::InvalidRoot`] for a bad root and
    /// [`NotesError::Pattern`] for a bad glob.
    pub fn with_options(root: &Path, options: ScanOptions, parser: P) -> Result<Self> {
        if !root.is_dir() {
            return Err(NotesError::InvalidRoot(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|_| NotesError::InvalidRoot(root.to_path_buf()))?;
        let matcher = GlobBuilder::new(&options.pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(Self {
            root,
            options,
            matcher,
            parser,
        })
    }

    /// Canonical scan root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discovery options.
    #[must_use]
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    fn should_skip_entry(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if self.options.skip_hidden && name.starts_with('.') {
            return true;
        }
        entry.file_type().is_dir()
            && self
                .options
                .excluded_dirs
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(&name))
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let value = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if value.is_empty() { None } else { Some(value) }
    }

    /// Symlinks count by their target; links to directories are not walked.
    fn is_document_file(entry: &DirEntry) -> bool {
        if entry.file_type().is_file() {
            return true;
        }
        entry.path_is_symlink()
            && std::fs::metadata(entry.path()).is_ok_and(|meta| meta.is_file())
    }

    /// Matching files as `(relative, absolute)` pairs in file-name order.
    #[must_use]
    pub fn discover(&self) -> Vec<(String, PathBuf)> {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.should_skip_entry(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("skipping unreadable directory entry: {e}");
                    None
                }
            })
            .filter(Self::is_document_file)
            .filter_map(|entry| {
                let relative = self.relative_path(entry.path())?;
                self.matcher
                    .is_match(&relative)
                    .then(|| (relative, entry.into_path()))
            })
            .collect()
    }

    /// Scan the root, reusing cache entries whose mtime still matches.
    ///
    /// Stale or missing entries are re-read, re-parsed and written back to
    /// `cache`. Files that vanish or fail to read/parse are reported in
    /// [`ScanReport::issues`] and left out of the mapping. The cache is not
    /// saved to disk here.
    ///
    /// Files are checked and parsed in parallel; cache recency is then
    /// updated in path order, so equal trees yield equal snapshots.
    pub fn scan(&self, cache: &PersistentCache) -> ScanReport {
        let files = self.discover();
        let outcomes: Vec<(String, Result<Loaded>)> = files
            .into_par_iter()
            .map(|(relative, absolute)| {
                let loaded = self.load_document(absolute, cache);
                (relative, loaded)
            })
            .collect();

        let mut report = ScanReport::default();
        for (relative_path, outcome) in outcomes {
            match outcome {
                Ok(Loaded::Reused {
                    key,
                    absolute_path,
                    cached,
                }) => {
                    // Promote in path order.
                    let _ = cache.get(&key);
                    report.reused += 1;
                    let doc = Document::new(relative_path.as_str(), absolute_path, cached);
                    report.documents.insert(relative_path, doc);
                }
                Ok(Loaded::Parsed {
                    key,
                    absolute_path,
                    parsed,
                }) => {
                    let parsed = cache.set(key, parsed);
                    report.reparsed += 1;
                    let doc = Document::new(relative_path.as_str(), absolute_path, parsed);
                    report.documents.insert(relative_path, doc);
                }
                Err(error) => {
                    if error.is_not_found() {
                        debug!("{relative_path} vanished during scan");
                    } else {
                        warn!("skipping {relative_path}: {error}");
                    }
                    report.issues.push(ScanIssue {
                        relative_path,
                        error,
                    });
                }
            }
        }
        info!(
            "scanned {}: {} documents ({} reparsed, {} cached, {} skipped)",
            self.root.display(),
            report.documents.len(),
            report.reparsed,
            report.reused,
            report.issues.len()
        );
        report
    }

    fn load_document(&self, absolute_path: PathBuf, cache: &PersistentCache) -> Result<Loaded> {
        let metadata =
            std::fs::metadata(&absolute_path).map_err(|e| NotesError::io(&absolute_path, e))?;
        let mod_time = metadata.modified().ok().and_then(ModTime::from_system_time);
        let key = absolute_path.to_string_lossy().into_owned();

        if let Some(mod_time) = mod_time
            && let Some(cached) = cache.peek(&key)
            && cached.mod_time == Some(mod_time)
        {
            return Ok(Loaded::Reused {
                key,
                absolute_path,
                cached,
            });
        }

        debug!("parsing {}", absolute_path.display());
        let content =
            std::fs::read_to_string(&absolute_path).map_err(|e| NotesError::io(&absolute_path, e))?;
        let tree = self
            .parser
            .parse(&content)
            .map_err(|message| NotesError::Parse {
                path: absolute_path.clone(),
                message,
            })?;
        Ok(Loaded::Parsed {
            key,
            absolute_path,
            parsed: ParsedDocument {
                mod_time,
                content,
                tree,
            },
        })
    }
}
