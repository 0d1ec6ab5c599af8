/*!
 * Script caching functionality.
 *
 * Scripts are stored by normalized title with the time they were stored.
 * Entries older than the TTL read as misses but stay in the map until
 * `purge_expired` runs. When a directory is configured every entry is also
 * written to disk as one JSON file, so later runs can reuse it.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::clock::Clock;
use crate::sources::RawScript;

static TRAILING_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\s*[\(\[]\s*(?:1[89]|20)\d{2}\s*[\)\]]|\s+(?:1[89]|20)\d{2})\s*$")
        .expect("Invalid year regex")
});

/// Normalize a title into a cache key.
///
/// "The Matrix", "the matrix (1999)" and "THE MATRIX [1999]" all map to
/// "the matrix".
pub fn normalize_title(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let without_year = TRAILING_YEAR.replace(&lowered, "");
    let base = if without_year.trim().is_empty() {
        lowered.as_str()
    } else {
        without_year.as_ref()
    };

    base.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A stored script and the time it was stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalized title
    pub key: String,
    /// The cached script
    pub script: RawScript,
    /// Insertion time
    pub stored_at: DateTime<Utc>,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries held in memory, fresh or not
    pub entries: usize,
    /// Entries past their TTL
    pub expired: usize,
    /// Lookups answered from the cache
    pub hits: usize,
    /// Lookups that missed
    pub misses: usize,
}

impl CacheStats {
    /// Share of lookups that hit
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Script cache keyed by normalized title
#[derive(Debug)]
pub struct ScriptCache {
    /// Internal cache storage
    entries: RwLock<HashMap<String, CacheEntry>>,

    /// Cache hit counter
    hits: RwLock<usize>,

    /// Cache miss counter
    misses: RwLock<usize>,

    /// Entry lifetime
    ttl: Duration,

    /// Time source for storage and expiry
    clock: Arc<dyn Clock>,

    /// Snapshot directory, if persistence is on
    directory: Option<PathBuf>,
}

impl ScriptCache {
    /// Create an in-memory cache
    pub fn new(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: RwLock::new(0),
            misses: RwLock::new(0),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            clock,
            directory: None,
        }
    }

    /// Also persist entries under `directory`
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        if let Err(e) = std::fs::create_dir_all(&directory) {
            warn!("Could not create cache directory {}: {}", directory.display(), e);
        }
        self.directory = Some(directory);
        self
    }

    /// Snapshot directory, if any
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) < self.ttl
    }

    /// Get a fresh script for `title`
    pub fn get(&self, title: &str) -> Option<RawScript> {
        let key = normalize_title(title);
        let now = self.clock.now();

        let in_memory = self.entries.read().get(&key).cloned();
        let entry = match in_memory {
            Some(entry) => Some(entry),
            None => self.load_from_disk(&key).inspect(|entry| {
                self.entries.write().insert(key.clone(), entry.clone());
            }),
        };

        match entry {
            Some(entry) if self.is_fresh(&entry, now) => {
                *self.hits.write() += 1;
                debug!("Cache hit for '{}' (from {})", key, entry.script.source);
                Some(entry.script)
            }
            Some(_) => {
                *self.misses.write() += 1;
                debug!("Cache entry for '{}' has expired", key);
                None
            }
            None => {
                *self.misses.write() += 1;
                debug!("Cache miss for '{}'", key);
                None
            }
        }
    }

    /// Store a script under `title`
    pub fn put(&self, title: &str, script: RawScript) {
        let key = normalize_title(title);
        let entry = CacheEntry {
            key: key.clone(),
            script,
            stored_at: self.clock.now(),
        };

        self.save_to_disk(&entry);
        self.entries.write().insert(key.clone(), entry);
        debug!("Cached script for '{}'", key);
    }

    /// Drop expired entries from memory and disk; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, entry| now.signed_duration_since(entry.stored_at) < self.ttl);
            before - entries.len()
        };

        let mut disk_removed = 0;
        for (path, entry) in self.disk_entries() {
            if !self.is_fresh(&entry, now) {
                match std::fs::remove_file(&path) {
                    Ok(()) => disk_removed += 1,
                    Err(e) => warn!("Could not remove {}: {}", path.display(), e),
                }
            }
        }
        // Entries already counted in memory share their file
        removed = removed.max(disk_removed);

        debug!("Purged {} expired cache entries", removed);
        removed
    }

    /// Clear the cache, including persisted entries
    pub fn clear(&self) {
        self.entries.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;

        for (path, _) in self.disk_entries() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }
        debug!("Script cache cleared");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read();
        CacheStats {
            entries: entries.len(),
            expired: entries.values().filter(|e| !self.is_fresh(e, now)).count(),
            hits: *self.hits.read(),
            misses: *self.misses.read(),
        }
    }

    /// Get the number of entries in memory
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn file_for(&self, key: &str) -> Option<PathBuf> {
        let directory = self.directory.as_ref()?;
        let digest = Sha256::digest(key.as_bytes());
        Some(directory.join(format!("{:x}.json", digest)))
    }

    fn save_to_disk(&self, entry: &CacheEntry) {
        let Some(path) = self.file_for(&entry.key) else {
            return;
        };
        let result = serde_json::to_string(entry)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("Could not persist cache entry {}: {}", path.display(), e);
        }
    }

    fn load_from_disk(&self, key: &str) -> Option<CacheEntry> {
        let path = self.file_for(key)?;
        if !path.exists() {
            return None;
        }
        match read_entry(&path) {
            Ok(entry) if entry.key == key => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn disk_entries(&self) -> Vec<(PathBuf, CacheEntry)> {
        let Some(directory) = &self.directory else {
            return Vec::new();
        };
        let reader = match std::fs::read_dir(directory) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Could not list cache directory {}: {}", directory.display(), e);
                return Vec::new();
            }
        };

        reader
            .filter_map(|item| item.ok().map(|item| item.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| read_entry(&path).ok().map(|entry| (path, entry)))
            .collect()
    }
}

fn read_entry(path: &Path) -> Result<CacheEntry, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}
