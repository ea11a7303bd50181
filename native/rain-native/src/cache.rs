use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, UNIX_EPOCH};

use crate::error::Result;
use crate::model::Data;
use crate::parse::Attributes;

/// Modification time in nanoseconds since the epoch, `None` if the file is
/// missing or the platform has no mtime.
pub fn modified_stamp(path: &Path) -> Option<u128> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_nanos())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub path: PathBuf,
    pub modified: Option<u128>,
}

impl Dependency {
    pub fn of(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            modified: modified_stamp(path),
        }
    }

    fn is_fresh(&self) -> bool {
        modified_stamp(&self.path) == self.modified
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub modified: Option<u128>,
    /// Hash of the render inputs (data and invocation attributes).
    pub fingerprint: String,
    pub dependencies: Vec<Dependency>,
    pub output: String,
    #[serde(skip, default = "Instant::now")]
    inserted: Instant,
}

impl CacheEntry {
    pub fn new(
        modified: Option<u128>,
        fingerprint: String,
        dependencies: Vec<Dependency>,
        output: String,
    ) -> Self {
        Self {
            modified,
            fingerprint,
            dependencies,
            output,
            inserted: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    #[default]
    Unbounded,
    /// Keep at most this many entries, dropping the oldest insertion first.
    MaxEntries(usize),
    MaxAge(Duration),
}

/// Rendered output per component file, valid while the file, its
/// dependencies and the render inputs are unchanged.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: IndexMap<PathBuf, CacheEntry>,
    policy: EvictionPolicy,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: EvictionPolicy) -> Self {
        Self {
            entries: IndexMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn compute_fingerprint(data: &Data, attributes: &Attributes) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_string(data).unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_string(attributes).unwrap_or_default().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// A fresh entry for `path`, or `None`. Stale entries are dropped.
    pub fn get(&mut self, path: &Path, modified: Option<u128>, fingerprint: &str) -> Option<&CacheEntry> {
        let fresh = {
            let entry = self.entries.get(path)?;
            entry.modified == modified
                && entry.fingerprint == fingerprint
                && !self.is_expired(entry)
                && entry.dependencies.iter().all(Dependency::is_fresh)
        };

        if !fresh {
            self.entries.shift_remove(path);
            return None;
        }
        self.entries.get(path)
    }

    pub fn set(&mut self, path: PathBuf, entry: CacheEntry) {
        self.entries.shift_remove(&path);
        self.entries.insert(path, entry);
        self.evict();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialize all entries so a caller can persist them.
    pub fn snapshot(&self) -> Result<String> {
        let entries: Vec<(&PathBuf, &CacheEntry)> = self.entries.iter().collect();
        Ok(serde_json::to_string(&entries)?)
    }

    /// Load entries from a snapshot; they are revalidated on lookup.
    pub fn restore(&mut self, snapshot: &str) -> Result<()> {
        let entries: Vec<(PathBuf, CacheEntry)> = serde_json::from_str(snapshot)?;
        for (path, entry) in entries {
            self.set(path, entry);
        }
        Ok(())
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        match self.policy {
            EvictionPolicy::MaxAge(max_age) => entry.inserted.elapsed() > max_age,
            _ => false,
        }
    }

    fn evict(&mut self) {
        match self.policy {
            EvictionPolicy::Unbounded => {}
            EvictionPolicy::MaxEntries(max) => {
                while self.entries.len() > max {
                    self.entries.shift_remove_index(0);
                }
            }
            EvictionPolicy::MaxAge(max_age) => {
                self.entries
                    .retain(|_, entry| entry.inserted.elapsed() <= max_age);
            }
        }
    }
}
