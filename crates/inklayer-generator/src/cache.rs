//! Change-detection cache.
//!
//! Entries are keyed by path relative to the content root and are valid while
//! the stored hash equals the file's current modification-time hash. The
//! cache file itself lives under a version and configuration-hash namespace,
//! so a configuration change starts from an empty cache.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use inklayer_core::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::Claim;

/// Version of the generation pipeline, part of the cache namespace.
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Memo of one compiled document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Modification-time hash of the source at compile time.
    pub hash: String,

    pub definition_type: String,

    pub document: Document,

    /// Compile time of the document.
    pub elapsed_ms: u64,

    /// Uniqueness claims made by the document, re-committed on cache hits.
    #[serde(default)]
    pub claims: Vec<Claim>,

    /// Asset sources of a fresh compile awaiting emission; never persisted.
    #[serde(skip)]
    pub assets: Vec<PathBuf>,
}

/// On-disk cache layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFile {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub config_hash: String,

    /// Claims of the last run, kept for diagnostics.
    #[serde(default)]
    pub uniques_ignored: BTreeMap<String, String>,

    #[serde(default)]
    pub items: BTreeMap<String, CacheEntry>,

    /// Duration of the last run in milliseconds.
    #[serde(default)]
    pub elapsed: u64,
}

/// In-memory cache for one generation run.
#[derive(Debug)]
pub struct DataCache {
    file: CacheFile,
    enabled: bool,
}

impl DataCache {
    /// Load the cache at `path`.
    ///
    /// A missing file yields an empty cache. An unreadable or corrupt file is
    /// logged and treated as empty, forcing a full recompile.
    pub fn load(path: &Path, config_hash: &str) -> Self {
        let empty = CacheFile {
            version: PIPELINE_VERSION.to_string(),
            config_hash: config_hash.to_string(),
            ..CacheFile::default()
        };

        let file = match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                Ok(file) if file.version == PIPELINE_VERSION && file.config_hash == config_hash => {
                    debug!(path = %path.display(), items = file.items.len(), "loaded cache");
                    file
                }
                Ok(_) => {
                    debug!(path = %path.display(), "cache namespace mismatch, starting empty");
                    empty
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt cache file");
                    empty
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => empty,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache file");
                empty
            }
        };

        Self {
            file,
            enabled: true,
        }
    }

    /// A cache that never hits and is never persisted.
    pub fn disabled() -> Self {
        Self {
            file: CacheFile::default(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cached entry for `relative_path` if its hash and type still match.
    pub fn lookup(&self, relative_path: &str, hash: &str, doc_type: &str) -> Option<&CacheEntry> {
        if !self.enabled {
            return None;
        }
        self.file
            .items
            .get(relative_path)
            .filter(|entry| entry.hash == hash && entry.definition_type == doc_type)
    }

    /// Insert or overwrite an entry.
    pub fn record(&mut self, relative_path: impl Into<String>, entry: CacheEntry) {
        self.file.items.insert(relative_path.into(), entry);
    }

    /// Drop an entry.
    pub fn remove(&mut self, relative_path: &str) -> Option<CacheEntry> {
        self.file.items.remove(relative_path)
    }

    /// Paths of entries produced by the given definition, sorted.
    pub fn paths_for_type(&self, doc_type: &str) -> Vec<String> {
        self.file
            .items
            .iter()
            .filter(|(_, entry)| entry.definition_type == doc_type)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Record the run's uniqueness claims.
    pub fn set_uniques(&mut self, uniques: BTreeMap<String, String>) {
        self.file.uniques_ignored = uniques;
    }

    /// Record the run's duration.
    pub fn set_elapsed(&mut self, elapsed_ms: u64) {
        self.file.elapsed = elapsed_ms;
    }

    pub fn len(&self) -> usize {
        self.file.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.items.is_empty()
    }

    /// Write the cache to `path`, creating parent directories.
    ///
    /// Does nothing for a disabled cache.
    pub fn save(&self, path: &Path) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(&self.file)?;
        fs::write(path, json)?;
        debug!(path = %path.display(), items = self.file.items.len(), "saved cache");
        Ok(())
    }
}

/// Directory holding every cache file; safe to delete.
pub fn cache_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("cache")
}

/// Location of the cache file for a configuration hash.
pub fn cache_file_path(output_dir: &Path, config_hash: &str) -> PathBuf {
    cache_dir(output_dir)
        .join(format!("v{PIPELINE_VERSION}"))
        .join(format!("data-{config_hash}.json"))
}

/// Change-detection hash: modification time in milliseconds since the epoch,
/// with the sub-millisecond part as a fraction.
pub fn mtime_hash(modified: SystemTime) -> String {
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}.{:06}", nanos / 1_000_000, nanos % 1_000_000)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use inklayer_core::{DocumentBody, DocumentFormat, UniqueScope};
    use serde_json::Map;
    use tempfile::TempDir;

    use super::*;

    fn entry(hash: &str, doc_type: &str) -> CacheEntry {
        CacheEntry {
            hash: hash.to_string(),
            definition_type: doc_type.to_string(),
            document: Document {
                id: "a.md".to_string(),
                slug: "a".to_string(),
                doc_type: doc_type.to_string(),
                format: DocumentFormat::Md,
                body: DocumentBody {
                    raw: "# A".to_string(),
                    compiled_code: "<h1>A</h1>".to_string(),
                },
                table_of_contents: None,
                read_time: None,
                git_info: None,
                fields: Map::new(),
            },
            elapsed_ms: 3,
            claims: vec![Claim::new("slug", UniqueScope::Definition, doc_type, "a")],
            assets: Vec::new(),
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let cache = DataCache::load(&dir.path().join("none.json"), "abc");
        assert!(cache.is_enabled());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lookup_requires_matching_hash() {
        let mut cache = DataCache::load(Path::new("/nonexistent/cache.json"), "abc");
        cache.record("a.md", entry("1", "post"));

        assert!(cache.lookup("a.md", "1", "post").is_some());
        assert!(cache.lookup("a.md", "2", "post").is_none());
        assert!(cache.lookup("a.md", "1", "page").is_none());
        assert!(cache.lookup("b.md", "1", "post").is_none());
    }

    #[test]
    fn test_disabled_never_hits_or_saves() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cache.json");

        let mut cache = DataCache::disabled();
        cache.record("a.md", entry("1", "post"));
        assert!(cache.lookup("a.md", "1", "post").is_none());

        cache.save(&path).expect("save");
        assert!(!path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().expect("tempdir");
        let path = cache_file_path(dir.path(), "abc");

        let mut cache = DataCache::load(&path, "abc");
        cache.record("a.md", entry("1", "post"));
        cache.set_elapsed(42);
        cache.save(&path).expect("save");
        assert!(path.exists());

        let reloaded = DataCache::load(&path, "abc");
        assert_eq!(reloaded.lookup("a.md", "1", "post"), Some(&entry("1", "post")));
        assert_eq!(reloaded.file.elapsed, 42);
    }

    #[test]
    fn test_namespace_mismatch_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cache.json");

        let mut cache = DataCache::load(&path, "abc");
        cache.record("a.md", entry("1", "post"));
        cache.save(&path).expect("save");

        assert!(DataCache::load(&path, "def").is_empty());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").expect("write");

        assert!(DataCache::load(&path, "abc").is_empty());
    }

    #[test]
    fn test_paths_for_type_and_remove() {
        let mut cache = DataCache::disabled();
        cache.record("b.md", entry("1", "post"));
        cache.record("a.md", entry("1", "post"));
        cache.record("p.md", entry("1", "page"));

        assert_eq!(cache.paths_for_type("post"), vec!["a.md", "b.md"]);
        assert!(cache.remove("a.md").is_some());
        assert_eq!(cache.paths_for_type("post"), vec!["b.md"]);
    }

    #[test]
    fn test_cache_file_path_is_namespaced() {
        let path = cache_file_path(Path::new("out"), "0123abcd");
        let expected = Path::new("out")
            .join("cache")
            .join(format!("v{PIPELINE_VERSION}"))
            .join("data-0123abcd.json");
        assert_eq!(path, expected);
    }

    #[test]
    fn test_mtime_hash() {
        let time = UNIX_EPOCH + Duration::from_nanos(1_700_000_000_123_456_789);
        assert_eq!(mtime_hash(time), "1700000000123.456789");
        assert_ne!(mtime_hash(time), mtime_hash(time + Duration::from_millis(1)));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let json = serde_json::to_value(entry("1", "post")).expect("serialize");
        assert!(json.get("definitionType").is_some());
        assert!(json.get("elapsedMs").is_some());
        assert_eq!(json["document"]["body"]["compiledCode"], "<h1>A</h1>");
    }
}
