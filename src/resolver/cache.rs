//! In-memory attribute cache
//!
//! One entry per attribute class holding the full set returned by the
//! service. Entries carry their fetch timestamp; expiry is checked by the
//! caller against a TTL so expired data can still be served on the sync path.

use chrono::{DateTime, Utc};
use epw_types::{AttributeClass, AttributeEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Cached attribute set for one class (also the persisted second-tier shape)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Vec<AttributeEntry>,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(data: Vec<AttributeEntry>) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or_default()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// Description for `code`, skipping blank descriptions
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.description.as_str())
            .filter(|d| !d.is_empty())
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
}

#[derive(Debug)]
pub(crate) struct AttributeCache {
    entries: RwLock<HashMap<AttributeClass, CacheEntry>>,
    ttl: Duration,
}

impl AttributeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn lookup(&self, class: AttributeClass, code: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&class)
            .and_then(|e| e.lookup(code))
            .map(str::to_string)
    }

    /// Missing or expired
    pub fn needs_refresh(&self, class: AttributeClass) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&class)
            .map(|e| e.is_expired(self.ttl))
            .unwrap_or(true)
    }

    pub fn insert(&self, class: AttributeClass, entry: CacheEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(class, entry);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let total_entries = entries.len();
        let expired_entries = entries.values().filter(|e| e.is_expired(self.ttl)).count();

        CacheStats {
            total_entries,
            active_entries: total_entries - expired_entries,
            expired_entries,
        }
    }
}
