//! Watch-mode bundle cache.
//!
//! The cache fills itself by observing `new_source`: every normalized build,
//! initial or autonomous rebuild, overwrites the entry for its module. Reads
//! come from the orchestrator. When watch mode is off the cache is disabled
//! and ignores writes, so every request builds.

use crate::events::BundleObserver;
use crate::module_name::ModuleName;
use crate::normalize::BundleOutcome;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cached outcome for one module.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized outcome of the latest build
    pub outcome: BundleOutcome,
    /// When the entry was written
    pub stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.duration_since(self.stored_at) >= ttl)
    }
}

/// Module name → latest normalized outcome.
#[derive(Debug)]
pub struct BundleCache {
    enabled: bool,
    ttl: Option<Duration>,
    entries: RwLock<HashMap<ModuleName, CacheEntry>>,
}

impl BundleCache {
    /// Create a cache. A disabled cache never stores anything.
    pub fn new(enabled: bool, ttl: Option<Duration>) -> Self {
        Self {
            enabled,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the cache stores outcomes.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Configured entry lifetime.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Live entry for `module`. Expired entries are reported as missing.
    pub fn get(&self, module: &ModuleName) -> Option<BundleOutcome> {
        let entries = self.entries.read();
        let entry = entries.get(module)?;
        if entry.is_expired(self.ttl, Instant::now()) {
            return None;
        }
        Some(entry.outcome.clone())
    }

    /// Entry for `module` with its timestamp, expired or not.
    pub fn entry(&self, module: &ModuleName) -> Option<CacheEntry> {
        self.entries.read().get(module).cloned()
    }

    /// Store an outcome, replacing any previous one.
    pub fn insert(&self, module: ModuleName, outcome: BundleOutcome) {
        if !self.enabled {
            return;
        }
        self.entries.write().insert(
            module,
            CacheEntry {
                outcome,
                stored_at: Instant::now(),
            },
        );
    }

    /// Remove the entry for `module`. Returns `true` if one existed.
    pub fn remove(&self, module: &ModuleName) -> bool {
        self.entries.write().remove(module).is_some()
    }

    /// Remove expired entries and return their module names.
    pub fn purge_expired(&self) -> Vec<ModuleName> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };
        let now = Instant::now();
        let mut expired = Vec::new();

        self.entries.write().retain(|module, entry| {
            if entry.is_expired(Some(ttl), now) {
                expired.push(module.clone());
                false
            } else {
                true
            }
        });

        expired
    }

    /// Whether an entry (expired or not) exists for `module`.
    pub fn contains(&self, module: &ModuleName) -> bool {
        self.entries.read().contains_key(module)
    }

    /// Cached module names.
    pub fn modules(&self) -> Vec<ModuleName> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl BundleObserver for BundleCache {
    fn new_source(&self, module: &ModuleName, outcome: &BundleOutcome) {
        self.insert(module.clone(), outcome.clone());
    }
}
