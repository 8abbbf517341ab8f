//! The key-value cache collaborator consumed by [`CacheDriver`]. The trait
//! mirrors the usual cache surface (get/set/delete plus an atomic `pull` and
//! a set-if-absent `add`); `pull` is what gives the cache driver its
//! exactly-once queue drain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::Result;

pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Store only when the key is absent (or expired). Returns whether the
    /// write happened; this is the primitive behind the cache lease.
    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Atomically read and remove a key.
    fn pull(&self, key: &str) -> Result<Option<Value>>;

    /// Atomic read-modify-write: `f` sees the current value (if any, and not
    /// expired) and returns the replacement, all under one lock so concurrent
    /// updates never overwrite each other. The stored entry carries no
    /// expiry.
    fn update(&self, key: &str, f: &dyn Fn(Option<Value>) -> Value) -> Result<()>;
}

struct MemoryEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process cache over a mutexed map. All five operations hold the lock
/// for their full duration, which is the atomicity guarantee the cache
/// driver's queue drain relies on.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, MemoryEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(MemoryEntry::expired) {
            entries.remove(key);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.entries().insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|entry| !entry.expired()) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn pull(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries();
        let entry = entries.remove(key);
        Ok(entry.filter(|e| !e.expired()).map(|e| e.value))
    }

    fn update(&self, key: &str, f: &dyn Fn(Option<Value>) -> Value) -> Result<()> {
        let mut entries = self.entries();
        let current = entries
            .get(key)
            .filter(|entry| !entry.expired())
            .map(|entry| entry.value.clone());
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: f(current),
                expires_at: None,
            },
        );
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("len", &self.entries().len())
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: Value,
    /// Unix seconds; absent means no expiry.
    expires_at: Option<u64>,
}

impl FileEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| unix_now() >= at)
    }
}

/// Single-file JSON cache so `schedule:optimize` output survives process
/// restarts. Writers serialize through the in-memory map's mutex; every
/// mutation rewrites the whole document.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, FileEntry>>,
}

impl FileCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), "file cache opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, FileEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, entries: &HashMap<String, FileEntry>) -> Result<()> {
        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(FileEntry::expired) {
            entries.remove(key);
            self.persist(&entries)?;
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries();
        entries.insert(
            key.to_string(),
            FileEntry {
                value,
                expires_at: ttl.map(|ttl| unix_now() + ttl.as_secs()),
            },
        );
        self.persist(&entries)
    }

    fn add(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|entry| !entry.expired()) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            FileEntry {
                value,
                expires_at: ttl.map(|ttl| unix_now() + ttl.as_secs()),
            },
        );
        self.persist(&entries)?;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn pull(&self, key: &str) -> Result<Option<Value>> {
        let mut entries = self.entries();
        let entry = entries.remove(key);
        if entry.is_some() {
            self.persist(&entries)?;
        }
        Ok(entry.filter(|e| !e.expired()).map(|e| e.value))
    }

    fn update(&self, key: &str, f: &dyn Fn(Option<Value>) -> Value) -> Result<()> {
        let mut entries = self.entries();
        let current = entries
            .get(key)
            .filter(|entry| !entry.expired())
            .map(|entry| entry.value.clone());
        entries.insert(
            key.to_string(),
            FileEntry {
                value: f(current),
                expires_at: None,
            },
        );
        self.persist(&entries)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
