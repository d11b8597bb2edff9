//! Persistent parse cache: recency-ordered, time-bounded, snapshotted to JSON.
//!
//! Entries are keyed by absolute file path. An entry older than the TTL
//! window (measured from its last write) reads as absent. The whole map is
//! written to one snapshot file per user; a missing, unreadable or foreign
//! snapshot loads as an empty cache.

use log::{debug, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{NotesError, Result};
use crate::models::ParsedDocument;

/// Default time-to-live of a cache entry (7 days).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Snapshot envelope version; any other value loads as empty.
pub const CACHE_SNAPSHOT_SCHEMA_VERSION: &str = "muninn.cache.snapshot.v1";

const CACHE_DIR_NAME: &str = "muninn";
const CACHE_FILE_NAME: &str = "cache.json";

/// Where the snapshot lives and how long entries stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Snapshot file path.
    pub snapshot_path: PathBuf,
    /// Entry time-to-live.
    pub ttl: Duration,
}

impl CacheConfig {
    /// Config for an explicit snapshot path with the default TTL.
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Override the TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Per-user default: `<platform cache dir>/muninn/cache.json`.
    ///
    /// Resolved once at the process boundary; the core never calls this.
    #[must_use]
    pub fn default_location() -> Option<Self> {
        dirs::cache_dir().map(|dir| Self::new(dir.join(CACHE_DIR_NAME).join(CACHE_FILE_NAME)))
    }
}

/// One snapshot record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Absolute file path.
    pub key: String,
    /// Cached parse result.
    pub value: ParsedDocument,
    /// Unix milliseconds of the last write; `0` (missing) is always expired.
    #[serde(default)]
    pub last_access: u64,
}

#[derive(Debug, Serialize)]
struct SnapshotOut<'a> {
    schema_version: &'a str,
    entries: &'a [CacheEntry],
}

#[derive(Debug, Deserialize)]
struct SnapshotIn {
    #[serde(default)]
    schema_version: String,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

#[derive(Debug)]
struct Slot {
    value: Arc<ParsedDocument>,
    last_access: u64,
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn ttl_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// A stamp more than one TTL ahead of `now` (clock rollback) is expired too.
fn is_fresh(last_access: u64, now: u64, ttl: Duration) -> bool {
    let ttl = ttl_ms(ttl);
    last_access > 0
        && last_access <= now.saturating_add(ttl)
        && now.saturating_sub(last_access) < ttl
}

/// Durable key/value store for parsed documents.
///
/// The in-memory map sits behind one mutex, so concurrent `get`/`set` from
/// scan workers are serialized.
#[derive(Debug)]
pub struct PersistentCache {
    config: CacheConfig,
    entries: Mutex<LruCache<String, Slot>>,
}

impl PersistentCache {
    /// Open the cache and load the snapshot if one exists.
    #[must_use]
    pub fn open(config: CacheConfig) -> Self {
        let entries = Self::load_snapshot(&config);
        Self {
            config,
            entries: Mutex::new(entries),
        }
    }

    /// Cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Snapshot file path.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.config.snapshot_path
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_snapshot(config: &CacheConfig) -> LruCache<String, Slot> {
        let mut entries = LruCache::unbounded();
        let path = &config.snapshot_path;
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no cache snapshot at {}", path.display());
                return entries;
            }
            Err(e) => {
                warn!("ignoring unreadable cache snapshot {}: {e}", path.display());
                return entries;
            }
        };
        let snapshot = match serde_json::from_str::<SnapshotIn>(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("ignoring corrupt cache snapshot {}: {e}", path.display());
                return entries;
            }
        };
        if snapshot.schema_version != CACHE_SNAPSHOT_SCHEMA_VERSION {
            warn!(
                "ignoring cache snapshot {} with schema '{}'",
                path.display(),
                snapshot.schema_version
            );
            return entries;
        }

        let now = now_unix_ms();
        let total = snapshot.entries.len();
        let mut dropped = 0_usize;
        // Snapshot is most-recent first; insert oldest first to rebuild recency.
        for raw_entry in snapshot.entries.into_iter().rev() {
            match serde_json::from_value::<CacheEntry>(raw_entry) {
                Ok(entry) if is_fresh(entry.last_access, now, config.ttl) => {
                    entries.put(
                        entry.key,
                        Slot {
                            value: Arc::new(entry.value),
                            last_access: entry.last_access,
                        },
                    );
                }
                Ok(_) | Err(_) => dropped += 1,
            }
        }
        debug!(
            "loaded cache snapshot {}: {} entries ({dropped} expired or malformed of {total})",
            path.display(),
            entries.len()
        );
        entries
    }

    /// Fresh value for `key`; promotes it to most recently used.
    ///
    /// Expired entries are removed and read as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<ParsedDocument>> {
        let now = now_unix_ms();
        let mut entries = self.lock();
        let found = entries.get(key).map(|slot| {
            (
                is_fresh(slot.last_access, now, self.config.ttl),
                Arc::clone(&slot.value),
            )
        });
        match found {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                entries.pop(key);
                debug!("cache entry expired: {key}");
                None
            }
            None => None,
        }
    }

    /// Fresh value for `key` without touching recency or removing anything.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Arc<ParsedDocument>> {
        let now = now_unix_ms();
        self.lock()
            .peek(key)
            .filter(|slot| is_fresh(slot.last_access, now, self.config.ttl))
            .map(|slot| Arc::clone(&slot.value))
    }

    /// Insert or replace `key`, resetting its recency and TTL clock.
    pub fn set(&self, key: impl Into<String>, value: ParsedDocument) -> Arc<ParsedDocument> {
        let now = now_unix_ms();
        let value = Arc::new(value);
        let mut entries = self.lock();
        entries.put(
            key.into(),
            Slot {
                value: Arc::clone(&value),
                last_access: now,
            },
        );
        Self::evict_expired_tail(&mut entries, now, self.config.ttl);
        value
    }

    /// Drop expired entries from the least-recent end.
    fn evict_expired_tail(entries: &mut LruCache<String, Slot>, now: u64, ttl: Duration) {
        while let Some((_, slot)) = entries.peek_lru() {
            if is_fresh(slot.last_access, now, ttl) {
                break;
            }
            entries.pop_lru();
        }
    }

    /// Number of entries held in memory (expired ones included until touched).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the in-memory map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Fresh entries, most recently used first.
    ///
    /// Trees carry no upward links, so entries are serializable as-is.
    #[must_use]
    pub fn dump(&self) -> Vec<CacheEntry> {
        let now = now_unix_ms();
        self.lock()
            .iter()
            .filter(|(_, slot)| is_fresh(slot.last_access, now, self.config.ttl))
            .map(|(key, slot)| CacheEntry {
                key: key.clone(),
                value: ParsedDocument::clone(&slot.value),
                last_access: slot.last_access,
            })
            .collect()
    }

    /// Write `dump()` to the snapshot file (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::SnapshotEncode`] or [`NotesError::SnapshotWrite`];
    /// a failed save is never swallowed.
    pub fn store(&self) -> Result<()> {
        let entries = self.dump();
        let encoded = serde_json::to_string(&SnapshotOut {
            schema_version: CACHE_SNAPSHOT_SCHEMA_VERSION,
            entries: &entries,
        })?;

        let path = &self.config.snapshot_path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| NotesError::snapshot_write(parent, e))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, encoded).map_err(|e| NotesError::snapshot_write(&tmp_path, e))?;
        std::fs::rename(&tmp_path, path).map_err(|e| NotesError::snapshot_write(path, e))?;
        debug!("stored cache snapshot {} ({} entries)", path.display(), entries.len());
        Ok(())
    }

    /// Delete the snapshot file and empty the in-memory map.
    ///
    /// Returns whether a snapshot file existed.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::SnapshotWrite`] when the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        self.lock().clear();
        let path = &self.config.snapshot_path;
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("removed cache snapshot {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(NotesError::snapshot_write(path, e)),
        }
    }
}
