//! ExceptionStore - persisted override table with backup tooling
//!
//! Every mutation is a read-modify-write of the in-memory snapshot under the
//! write lock, so a change that could not be persisted is still carried by
//! later writes. Persistence failures never reach the caller: a failed
//! primary write is retried once against the emergency key and logged.

use super::integrity;
use super::{normalize_code, seed_snapshot, BACKUP_KEY, EMERGENCY_KEY, PRIMARY_KEY};
use crate::error::{ExceptionError, StoreError};
use crate::resolver::Describe;
use crate::store::KvStore;
use chrono::{DateTime, Utc};
use epw_types::{
    AttributeClass, AttributeEntry, BackupEnvelope, BackupSource, DecodedProduct,
    ExceptionRecord, ExceptionSnapshot, IntegrityReport, ManualMapping,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// Summary counters for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionStats {
    pub total: usize,
    pub with_mapping: usize,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

/// Where a snapshot write ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistTarget {
    Primary,
    Emergency,
    Lost,
}

pub struct ExceptionStore {
    store: Arc<dyn KvStore>,
    snapshot: RwLock<ExceptionSnapshot>,
}

impl ExceptionStore {
    /// Open the table persisted in `store` (seeded if nothing usable is there)
    pub fn open(store: Arc<dyn KvStore>) -> Self {
        let snapshot = read_snapshot(store.as_ref());
        info!(
            "Exception table loaded: {} records (version {})",
            snapshot.exceptions.len(),
            snapshot.version
        );
        Self {
            store,
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Re-read the persisted snapshot; never fails
    pub fn load(&self) -> ExceptionSnapshot {
        let fresh = read_snapshot(self.store.as_ref());
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = fresh.clone();
        fresh
    }

    /// Current in-memory snapshot
    pub fn snapshot(&self) -> ExceptionSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn list(&self) -> Vec<ExceptionRecord> {
        self.snapshot().exceptions
    }

    pub fn get(&self, code: &str) -> Option<ExceptionRecord> {
        let code = normalize_code(code);
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        guard.find(&code).cloned()
    }

    /// Insert or replace the record for `code`, keeping the original `created_at`
    pub fn upsert(
        &self,
        code: &str,
        reason: &str,
        manual_mapping: Option<ManualMapping>,
    ) -> Result<ExceptionRecord, ExceptionError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(ExceptionError::EmptyCode);
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ExceptionError::EmptyReason);
        }
        let manual_mapping = manual_mapping.filter(|m| !m.is_empty());

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot = guard.clone();
        let now = Utc::now();

        let record = match snapshot.exceptions.iter_mut().find(|r| r.code == code) {
            Some(existing) => {
                existing.reason = reason.to_string();
                existing.manual_mapping = manual_mapping;
                existing.updated_at = now;
                debug!("Updated exception {}", code);
                existing.clone()
            }
            None => {
                let record = ExceptionRecord {
                    code: code.clone(),
                    reason: reason.to_string(),
                    manual_mapping,
                    created_at: now,
                    updated_at: now,
                };
                snapshot.exceptions.push(record.clone());
                debug!("Added exception {}", code);
                record
            }
        };

        self.commit(&mut guard, snapshot);
        Ok(record)
    }

    /// Delete the record for `code`; returns false (and changes nothing) if absent
    pub fn remove(&self, code: &str) -> bool {
        let code = normalize_code(code);
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if guard.find(&code).is_none() {
            info!("Exception {} not found; nothing removed", code);
            return false;
        }

        let mut snapshot = guard.clone();
        snapshot.exceptions.retain(|r| r.code != code);

        self.commit(&mut guard, snapshot);
        true
    }

    /// Manual mapping values take precedence; unmapped fields keep the automatic decode
    pub fn apply_override(
        &self,
        code: &str,
        decoded_default: DecodedProduct,
        describer: &(impl Describe + ?Sized),
    ) -> DecodedProduct {
        let Some(mapping) = self.get(code).and_then(|r| r.manual_mapping) else {
            return decoded_default;
        };

        let mut product = decoded_default;
        for class in AttributeClass::ALL {
            if let Some(manual) = mapping.get(class) {
                let manual = manual.trim().to_uppercase();
                let description = describer.describe(class, &manual);
                product.set(class, AttributeEntry::new(manual, description));
            }
        }
        product
    }

    /// Serialize the whole table for download
    pub fn export(&self) -> serde_json::Result<String> {
        let data = self.snapshot();
        let envelope = BackupEnvelope {
            version: data.version,
            data,
            backup_date: Utc::now(),
            source: BackupSource::Export,
        };
        serde_json::to_string_pretty(&envelope)
    }

    /// Merge an exported table into the local one; imported records win per code
    pub fn import(&self, serialized: &str) -> bool {
        let value: Value = match serde_json::from_str(serialized) {
            Ok(value) => value,
            Err(e) => {
                warn!("Import rejected: not valid JSON: {}", e);
                return false;
            }
        };
        let Some(items) = value
            .get("data")
            .and_then(|d| d.get("exceptions"))
            .and_then(Value::as_array)
        else {
            warn!("Import rejected: data.exceptions is missing or not an array");
            return false;
        };

        let imported: Vec<ExceptionRecord> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<ExceptionRecord>(item.clone()) {
                Ok(mut record) => {
                    record.code = normalize_code(&record.code);
                    record.reason = record.reason.trim().to_string();
                    if record.code.is_empty() || record.reason.is_empty() {
                        warn!("Skipping imported exception #{}: empty code or reason", i);
                        None
                    } else {
                        Some(record)
                    }
                }
                Err(e) => {
                    warn!("Skipping imported exception #{}: {}", i, e);
                    None
                }
            })
            .collect();

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot = guard.clone();

        let count = imported.len();
        for record in imported {
            match snapshot.exceptions.iter_mut().find(|r| r.code == record.code) {
                Some(existing) => *existing = record,
                None => snapshot.exceptions.push(record),
            }
        }

        self.commit(&mut guard, snapshot);
        info!("Imported {} exceptions", count);
        true
    }

    /// Write the current table to the backup key
    pub fn create_backup(&self, source: BackupSource) -> bool {
        let snapshot = self.snapshot();
        self.write_backup(&snapshot, source)
    }

    /// Replace the primary snapshot with the backup; false if there is no usable backup
    pub fn restore_from_backup(&self) -> bool {
        let raw = match self.store.get(BACKUP_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!("No exception backup to restore");
                return false;
            }
            Err(e) => {
                warn!("Failed to read exception backup: {}", e);
                return false;
            }
        };
        let envelope: BackupEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Exception backup is corrupt: {}", e);
                return false;
            }
        };

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if self.persist(&envelope.data) == PersistTarget::Lost {
            return false;
        }
        info!(
            "Restored {} exceptions from {} backup of {}",
            envelope.data.exceptions.len(),
            envelope.source.as_str(),
            envelope.backup_date
        );
        *guard = envelope.data;
        true
    }

    /// Structural check of the live persisted table (or the in-memory one if nothing is persisted)
    pub fn validate_integrity(&self) -> IntegrityReport {
        match live_raw(self.store.as_ref()) {
            Ok(Some(raw)) => integrity::validate_raw(&raw),
            Ok(None) => integrity::validate_snapshot(&self.snapshot()),
            Err(e) => IntegrityReport::from_errors(vec![format!(
                "failed to read exception table: {}",
                e
            )]),
        }
    }

    pub fn stats(&self) -> ExceptionStats {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        ExceptionStats {
            total: guard.exceptions.len(),
            with_mapping: guard
                .exceptions
                .iter()
                .filter(|r| r.manual_mapping.is_some())
                .count(),
            version: guard.version,
            last_updated: guard.last_updated,
        }
    }

    /// Bump version, persist, refresh memory and write the automatic backup
    fn commit(&self, current: &mut ExceptionSnapshot, mut snapshot: ExceptionSnapshot) {
        snapshot.version += 1;
        snapshot.last_updated = Utc::now();

        self.persist(&snapshot);
        self.write_backup(&snapshot, BackupSource::Auto);
        *current = snapshot;
    }

    fn persist(&self, snapshot: &ExceptionSnapshot) -> PersistTarget {
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize exception table: {}", e);
                return PersistTarget::Lost;
            }
        };

        match self.store.set(PRIMARY_KEY, &json) {
            Ok(()) => {
                // A successful primary write supersedes any emergency copy
                if let Err(e) = self.store.remove(EMERGENCY_KEY) {
                    debug!("Could not clear emergency exception copy: {}", e);
                }
                PersistTarget::Primary
            }
            Err(e) => {
                warn!("Primary exception write failed, using emergency key: {}", e);
                match self.store.set(EMERGENCY_KEY, &json) {
                    Ok(()) => PersistTarget::Emergency,
                    Err(e) => {
                        error!("Emergency exception write failed, changes kept in memory only: {}", e);
                        PersistTarget::Lost
                    }
                }
            }
        }
    }

    fn write_backup(&self, snapshot: &ExceptionSnapshot, source: BackupSource) -> bool {
        let envelope = BackupEnvelope {
            data: snapshot.clone(),
            backup_date: Utc::now(),
            version: snapshot.version,
            source,
        };
        let result = serde_json::to_string(&envelope)
            .map_err(|e| e.to_string())
            .and_then(|json| self.store.set(BACKUP_KEY, &json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {} exception backup: {}", source.as_str(), e);
                false
            }
        }
    }
}

/// Newest of primary / emergency, or the seed
fn read_snapshot(store: &dyn KvStore) -> ExceptionSnapshot {
    let primary = read_key(store, PRIMARY_KEY);
    let emergency = read_key(store, EMERGENCY_KEY);

    match (primary, emergency) {
        (Some(p), Some(e)) if e.last_updated > p.last_updated => {
            warn!("Using emergency exception snapshot (newer than primary)");
            e
        }
        (Some(p), _) => p,
        (None, Some(e)) => {
            warn!("Using emergency exception snapshot (primary unavailable)");
            e
        }
        (None, None) => seed_snapshot(),
    }
}

/// Raw JSON of whichever persisted snapshot `read_snapshot` would pick
fn live_raw(store: &dyn KvStore) -> Result<Option<String>, StoreError> {
    let primary = store.get(PRIMARY_KEY)?;
    let emergency = store.get(EMERGENCY_KEY).unwrap_or_else(|e| {
        warn!("Failed to read {}: {}", EMERGENCY_KEY, e);
        None
    });

    let parse = |raw: &Option<String>| {
        raw.as_deref()
            .and_then(|r| serde_json::from_str::<ExceptionSnapshot>(r).ok())
    };
    match (parse(&primary), parse(&emergency)) {
        (Some(p), Some(e)) if e.last_updated > p.last_updated => Ok(emergency),
        (None, Some(_)) => Ok(emergency),
        _ => Ok(primary),
    }
}

fn read_key(store: &dyn KvStore, key: &str) -> Option<ExceptionSnapshot> {
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!("Failed to read {}: {}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("Discarding unreadable {}: {}", key, e);
            None
        }
    }
}
