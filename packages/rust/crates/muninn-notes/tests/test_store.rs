//! Integration tests for directory scans against the parse cache.

use muninn_notes::{
    CacheConfig, DocumentParser, DocumentStore, DocumentTree, MarkdownParser, NotesError,
    PersistentCache, ScanOptions,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Markdown parser that counts how often it runs.
#[derive(Debug, Clone, Default)]
struct CountingParser {
    calls: Arc<AtomicUsize>,
}

impl CountingParser {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentParser for CountingParser {
    fn parse(&self, text: &str) -> Result<DocumentTree, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        MarkdownParser.parse(text)
    }
}

/// Rejects any document containing `BROKEN`.
#[derive(Debug, Clone, Copy)]
struct PickyParser;

impl DocumentParser for PickyParser {
    fn parse(&self, text: &str) -> Result<DocumentTree, String> {
        if text.contains("BROKEN") {
            return Err("unsupported construct".to_string());
        }
        MarkdownParser.parse(text)
    }
}

fn write_file(root: &Path, rel: &str, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn set_mtime(path: &Path, time: SystemTime) -> Result<(), Box<dyn std::error::Error>> {
    fs::OpenOptions::new()
        .write(true)
        .open(path)?
        .set_modified(time)?;
    Ok(())
}

fn sample_notes(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    write_file(root, "a.md", "# A\n\nSee [B](b.md).\n")?;
    write_file(root, "b.md", "# B\n")?;
    write_file(root, "docs/c.md", "Back to [a](../a.md)\n")?;
    write_file(root, "readme.txt", "not a note")?;
    Ok(())
}

#[test]
fn test_scan_discovers_markdown_only() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    sample_notes(notes.path())?;

    let store = DocumentStore::new(notes.path(), MarkdownParser)?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    let report = store.scan(&cache);

    let keys: Vec<&str> = report.documents.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a.md", "b.md", "docs/c.md"]);
    assert!(report.issues.is_empty());
    assert_eq!(report.reparsed, 3);
    assert_eq!(report.reused, 0);

    let doc = report.documents.get("docs/c.md").ok_or("missing docs/c.md")?;
    assert_eq!(doc.relative_path(), "docs/c.md");
    assert_eq!(doc.content(), "Back to [a](../a.md)\n");
    assert!(doc.absolute_path().is_absolute());
    assert!(doc.mod_time().is_some());
    assert_eq!(doc.tree().root().id, "");
    Ok(())
}

#[test]
fn test_rescan_reuses_every_unchanged_document() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    sample_notes(notes.path())?;

    let parser = CountingParser::default();
    let store = DocumentStore::new(notes.path(), parser.clone())?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));

    let first = store.scan(&cache);
    assert_eq!(parser.calls(), 3);
    let second = store.scan(&cache);
    assert_eq!(parser.calls(), 3, "second scan must not parse anything");
    assert_eq!(second.reused, 3);
    assert_eq!(second.reparsed, 0);
    assert_eq!(first.documents, second.documents);
    Ok(())
}

#[test]
fn test_snapshot_carries_reuse_across_runs() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    sample_notes(notes.path())?;
    let config = CacheConfig::new(cache_dir.path().join("cache.json"));

    let first = {
        let store = DocumentStore::new(notes.path(), MarkdownParser)?;
        let cache = PersistentCache::open(config.clone());
        let report = store.scan(&cache);
        cache.store()?;
        report
    };

    let parser = CountingParser::default();
    let store = DocumentStore::new(notes.path(), parser.clone())?;
    let cache = PersistentCache::open(config);
    let second = store.scan(&cache);
    assert_eq!(parser.calls(), 0);
    assert_eq!(second.reused, 3);
    assert_eq!(first.documents, second.documents);
    Ok(())
}

#[test]
fn test_touched_file_is_reparsed_even_with_same_content()
-> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    sample_notes(notes.path())?;

    let parser = CountingParser::default();
    let store = DocumentStore::new(notes.path(), parser.clone())?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    let first = store.scan(&cache);

    let b_path = notes.path().join("b.md");
    let before = first
        .documents
        .get("b.md")
        .and_then(|doc| doc.mod_time())
        .ok_or("b.md has no mtime")?;
    set_mtime(&b_path, SystemTime::now() + Duration::from_secs(120))?;

    let second = store.scan(&cache);
    assert_eq!(parser.calls(), 4, "only b.md is parsed again");
    assert_eq!(second.reparsed, 1);
    assert_eq!(second.reused, 2);
    let after = second
        .documents
        .get("b.md")
        .and_then(|doc| doc.mod_time())
        .ok_or("b.md has no mtime")?;
    assert_ne!(before, after);
    Ok(())
}

#[test]
fn test_edited_file_replaces_document() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    sample_notes(notes.path())?;

    let store = DocumentStore::new(notes.path(), MarkdownParser)?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    store.scan(&cache);

    let a_path = notes.path().join("a.md");
    fs::write(&a_path, "# A\n\nNo links any more.\n")?;
    set_mtime(&a_path, SystemTime::now() + Duration::from_secs(120))?;

    let report = store.scan(&cache);
    let doc = report.documents.get("a.md").ok_or("missing a.md")?;
    assert_eq!(doc.content(), "# A\n\nNo links any more.\n");
    Ok(())
}

#[test]
fn test_deleted_file_leaves_mapping() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    sample_notes(notes.path())?;

    let store = DocumentStore::new(notes.path(), MarkdownParser)?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    assert!(store.scan(&cache).documents.contains_key("b.md"));

    fs::remove_file(notes.path().join("b.md"))?;
    let report = store.scan(&cache);
    assert!(!report.documents.contains_key("b.md"));
    assert_eq!(report.documents.len(), 2);
    Ok(())
}

#[test]
fn test_hidden_entries_are_skipped_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    write_file(notes.path(), "keep.md", "kept")?;
    write_file(notes.path(), ".hidden.md", "hidden")?;
    write_file(notes.path(), ".obsidian/workspace.md", "hidden dir")?;
    write_file(notes.path(), "Target/goals.md", "goals")?;
    write_file(notes.path(), "venv/trip.md", "trip")?;
    write_file(notes.path(), "node_modules/readme.md", "folder named like a tool dir")?;

    let store = DocumentStore::new(notes.path(), MarkdownParser)?;
    let found: Vec<String> = store.discover().into_iter().map(|(rel, _)| rel).collect();
    assert_eq!(
        found,
        vec!["Target/goals.md", "keep.md", "node_modules/readme.md", "venv/trip.md"]
    );
    Ok(())
}

#[test]
fn test_excluded_dirs_and_hidden_entries_are_configurable()
-> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    write_file(notes.path(), "keep.md", "kept")?;
    write_file(notes.path(), ".hidden.md", "hidden")?;
    write_file(notes.path(), "Archive/old.md", "old")?;
    write_file(notes.path(), "archive2/new.md", "new")?;

    let options = ScanOptions {
        skip_hidden: false,
        excluded_dirs: vec!["archive".to_string()],
        ..ScanOptions::default()
    };
    let store = DocumentStore::with_options(notes.path(), options, MarkdownParser)?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    let keys: Vec<String> = store.scan(&cache).documents.into_keys().collect();
    assert_eq!(keys, vec![".hidden.md", "archive2/new.md", "keep.md"]);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlinked_note_is_scanned() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let outside = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    write_file(notes.path(), "a.md", "see [linked](linked.md)")?;
    write_file(outside.path(), "real.md", "# Real\n")?;
    std::os::unix::fs::symlink(outside.path().join("real.md"), notes.path().join("linked.md"))?;
    std::os::unix::fs::symlink(outside.path(), notes.path().join("linked-dir"))?;

    let store = DocumentStore::new(notes.path(), MarkdownParser)?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    let report = store.scan(&cache);

    let keys: Vec<&str> = report.documents.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a.md", "linked.md"], "directory links are not walked");
    let linked = report.documents.get("linked.md").ok_or("missing linked.md")?;
    assert_eq!(linked.content(), "# Real\n");
    assert!(linked.mod_time().is_some());

    let second = store.scan(&cache);
    assert_eq!(second.reused, 2);
    Ok(())
}

#[test]
fn test_snapshot_order_follows_paths() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    for index in 0..32 {
        write_file(notes.path(), &format!("n{index:02}/note.md"), "[b](../b.md)")?;
    }
    let store = DocumentStore::new(notes.path(), MarkdownParser)?;
    let mut expected: Vec<String> = store
        .discover()
        .into_iter()
        .map(|(_, absolute)| absolute.to_string_lossy().into_owned())
        .collect();
    expected.reverse();

    for _ in 0..2 {
        let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cold.json")));
        store.scan(&cache);
        let keys: Vec<String> = cache.dump().into_iter().map(|entry| entry.key).collect();
        assert_eq!(keys, expected, "most recent first, in reverse path order");
    }

    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("warm.json")));
    store.scan(&cache);
    cache.store()?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("warm.json")));
    let report = store.scan(&cache);
    assert_eq!(report.reused, 32);
    let keys: Vec<String> = cache.dump().into_iter().map(|entry| entry.key).collect();
    assert_eq!(keys, expected, "reuse promotes in path order too");
    Ok(())
}

#[test]
fn test_custom_pattern_selects_documents() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    write_file(notes.path(), "top.md", "top")?;
    write_file(notes.path(), "journal/2024.md", "entry")?;

    let options = ScanOptions {
        pattern: "journal/*.md".to_string(),
        ..ScanOptions::default()
    };
    let store = DocumentStore::with_options(notes.path(), options, MarkdownParser)?;
    let found: Vec<String> = store.discover().into_iter().map(|(rel, _)| rel).collect();
    assert_eq!(found, vec!["journal/2024.md"]);
    Ok(())
}

#[test]
fn test_parse_failure_skips_file_and_continues() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    sample_notes(notes.path())?;
    write_file(notes.path(), "bad.md", "BROKEN note")?;
    fs::write(notes.path().join("binary.md"), [0xff_u8, 0xfe, 0x00, 0x41])?;

    let store = DocumentStore::new(notes.path(), PickyParser)?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    let report = store.scan(&cache);

    assert_eq!(report.documents.len(), 3);
    let mut skipped: Vec<&str> = report
        .issues
        .iter()
        .map(|issue| issue.relative_path.as_str())
        .collect();
    skipped.sort_unstable();
    assert_eq!(skipped, vec!["bad.md", "binary.md"]);
    assert!(report.issues.iter().any(|issue| matches!(
        &issue.error,
        NotesError::Parse { message, .. } if message == "unsupported construct"
    )));
    assert!(
        report
            .issues
            .iter()
            .any(|issue| matches!(issue.error, NotesError::Io { .. }))
    );
    assert!(cache.get(&notes.path().canonicalize()?.join("bad.md").to_string_lossy()).is_none());

    let stats = report.stats();
    assert_eq!(stats.documents, 3);
    assert_eq!(stats.issues.len(), 2);
    Ok(())
}

#[test]
fn test_invalid_root_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let missing = tmp.path().join("nowhere");
    let err = DocumentStore::new(&missing, MarkdownParser)
        .err()
        .ok_or("missing root accepted")?;
    assert!(matches!(err, NotesError::InvalidRoot(_)));

    let file = tmp.path().join("file.md");
    fs::write(&file, "x")?;
    let err = DocumentStore::new(&file, MarkdownParser)
        .err()
        .ok_or("file root accepted")?;
    assert!(matches!(err, NotesError::InvalidRoot(_)));

    let options = ScanOptions {
        pattern: "[".to_string(),
        ..ScanOptions::default()
    };
    let err = DocumentStore::with_options(tmp.path(), options, MarkdownParser)
        .err()
        .ok_or("bad pattern accepted")?;
    assert!(matches!(err, NotesError::Pattern(_)));
    Ok(())
}

#[test]
fn test_empty_root_scans_to_empty_mapping() -> Result<(), Box<dyn std::error::Error>> {
    let notes = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    let store = DocumentStore::new(notes.path(), MarkdownParser)?;
    let cache = PersistentCache::open(CacheConfig::new(cache_dir.path().join("cache.json")));
    let report = store.scan(&cache);
    assert!(report.documents.is_empty());
    assert!(report.issues.is_empty());
    Ok(())
}
