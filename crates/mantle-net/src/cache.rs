use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::warn;
use mantle_platform::write_atomic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Disk budget for cached response bodies.
pub const DEFAULT_CACHE_CAPACITY: u64 = 50 * 1024 * 1024;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    file: String,
    size: u64,
    etag: Option<String>,
    last_modified: Option<String>,
    last_used: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct CacheIndex {
    entries: HashMap<String, EntryMeta>,
}

impl CacheIndex {
    fn total_size(&self) -> u64 {
        self.entries.values().map(|meta| meta.size).sum()
    }
}

/// Cached revalidation headers for a stored response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// LRU-bounded response cache keyed by request URL.
///
/// Bodies live in files named by the URL's SHA-256; the index maps URLs to
/// metadata and is persisted atomically on every mutation. Cache I/O never
/// fails a request: a broken entry just means an unconditional refetch.
pub struct ResponseCache {
    root: PathBuf,
    capacity: u64,
    index: Mutex<CacheIndex>,
}

impl ResponseCache {
    /// Open (or create) a cache rooted at `root`.
    ///
    /// # Errors
    /// Returns an error when the cache directory cannot be created. An
    /// unreadable or corrupt index is discarded, not an error.
    pub fn open(root: PathBuf, capacity: u64) -> std::io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        let index = std::fs::read_to_string(root.join(INDEX_FILE))
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();
        Ok(Self {
            root,
            capacity,
            index: Mutex::new(index),
        })
    }

    /// Revalidation headers for `url`, if a complete entry is on disk.
    pub fn validators_for(&self, url: &str) -> Option<Validators> {
        let index = self.lock_index();
        let meta = index.entries.get(url)?;
        if !self.root.join(&meta.file).is_file() {
            return None;
        }
        Some(Validators {
            etag: meta.etag.clone(),
            last_modified: meta.last_modified.clone(),
        })
    }

    /// Body stored for `url`, bumping its recency.
    pub fn read_body(&self, url: &str) -> Option<Vec<u8>> {
        let mut index = self.lock_index();
        let meta = index.entries.get_mut(url)?;
        let body = std::fs::read(self.root.join(&meta.file)).ok()?;
        meta.last_used = Utc::now();
        self.persist_index(&index);
        Some(body)
    }

    /// Store a response body with its validators, evicting the least
    /// recently used entries when over capacity.
    pub fn store(
        &self,
        url: &str,
        etag: Option<String>,
        last_modified: Option<String>,
        body: &[u8],
    ) {
        let file = body_file_name(url);
        if let Err(error) = write_atomic(&self.root.join(&file), body) {
            warn!("Failed to write cache body for {url}: {error}");
            return;
        }

        let mut index = self.lock_index();
        index.entries.insert(
            url.to_owned(),
            EntryMeta {
                file,
                size: body.len() as u64,
                etag,
                last_modified,
                last_used: Utc::now(),
            },
        );
        self.evict_to_capacity(&mut index);
        self.persist_index(&index);
    }

    fn evict_to_capacity(&self, index: &mut CacheIndex) {
        while index.total_size() > self.capacity {
            let Some(oldest) = index
                .entries
                .iter()
                .min_by_key(|(_, meta)| meta.last_used)
                .map(|(url, _)| url.clone())
            else {
                return;
            };
            if let Some(meta) = index.entries.remove(&oldest) {
                let _ = std::fs::remove_file(self.root.join(&meta.file));
            }
        }
    }

    fn persist_index(&self, index: &CacheIndex) {
        match serde_json::to_vec(index) {
            Ok(data) => {
                if let Err(error) = write_atomic(&self.root.join(INDEX_FILE), &data) {
                    warn!("Failed to persist HTTP cache index: {error}");
                }
            }
            Err(error) => warn!("Failed to serialize HTTP cache index: {error}"),
        }
    }

    fn lock_index(&self) -> std::sync::MutexGuard<'_, CacheIndex> {
        self.index
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn body_file_name(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::{ResponseCache, Validators, body_file_name};

    fn open_cache(root: &std::path::Path, capacity: u64) -> ResponseCache {
        ResponseCache::open(root.to_path_buf(), capacity).expect("cache should open")
    }

    #[test]
    fn stored_entry_round_trips_body_and_validators() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let cache = open_cache(temp_dir.path(), 1024);

        cache.store(
            "https://example.org/releases",
            Some("\"abc123\"".to_owned()),
            None,
            b"{\"assets\":[]}",
        );

        assert_eq!(
            cache.validators_for("https://example.org/releases"),
            Some(Validators {
                etag: Some("\"abc123\"".to_owned()),
                last_modified: None,
            })
        );
        assert_eq!(
            cache.read_body("https://example.org/releases").as_deref(),
            Some(b"{\"assets\":[]}".as_slice())
        );
    }

    #[test]
    fn missing_body_file_hides_validators() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let cache = open_cache(temp_dir.path(), 1024);

        cache.store("https://example.org/a", Some("\"v1\"".to_owned()), None, b"abc");
        std::fs::remove_file(temp_dir.path().join(body_file_name("https://example.org/a")))
            .expect("body file should exist");

        assert!(cache.validators_for("https://example.org/a").is_none());
    }

    #[test]
    fn eviction_drops_least_recently_used_first() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let cache = open_cache(temp_dir.path(), 10);

        cache.store("https://example.org/a", None, Some("t0".to_owned()), b"1234");
        cache.store("https://example.org/b", None, Some("t1".to_owned()), b"1234");
        // Touch the first entry so the second becomes the LRU victim.
        let _ = cache.read_body("https://example.org/a");
        cache.store("https://example.org/c", None, Some("t2".to_owned()), b"1234");

        assert!(cache.read_body("https://example.org/a").is_some());
        assert!(cache.read_body("https://example.org/b").is_none());
        assert!(cache.read_body("https://example.org/c").is_some());
    }

    #[test]
    fn index_survives_reopen() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        {
            let cache = open_cache(temp_dir.path(), 1024);
            cache.store("https://example.org/x", Some("\"e\"".to_owned()), None, b"body");
        }

        let reopened = open_cache(temp_dir.path(), 1024);
        assert_eq!(
            reopened.read_body("https://example.org/x").as_deref(),
            Some(b"body".as_slice())
        );
    }

    #[test]
    fn corrupt_index_is_discarded() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        std::fs::write(temp_dir.path().join("index.json"), "{broken")
            .expect("corrupt index should be written");

        let cache = open_cache(temp_dir.path(), 1024);
        assert!(cache.read_body("https://example.org/x").is_none());
    }
}
