//! Exception table - user-maintained overrides for irregular codes
//!
//! Codes the segment parser gets wrong are recorded here with a reason and,
//! optionally, a manual mapping for some or all of the six segments. The
//! table is persisted through a `KvStore` under three keys:
//!
//! - primary snapshot (source of truth)
//! - backup envelope (last known good, rewritten after every mutation)
//! - emergency snapshot (only written when the primary write fails)

pub mod integrity;
pub mod store;

pub use store::{ExceptionStats, ExceptionStore};

use chrono::Utc;
use epw_types::{ExceptionRecord, ExceptionSnapshot, ManualMapping};

pub const PRIMARY_KEY: &str = "epw_exceptions";
pub const BACKUP_KEY: &str = "epw_exceptions_backup";
pub const EMERGENCY_KEY: &str = "epw_exceptions_emergency";

/// Trimmed, uppercase form under which records are keyed
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Table used when nothing has been persisted yet
pub fn seed_snapshot() -> ExceptionSnapshot {
    let now = Utc::now();
    ExceptionSnapshot {
        exceptions: vec![ExceptionRecord {
            code: "PSL23BA01".to_string(),
            reason: "Modelo Slim sem certificação: a leitura automática separa S/L como certificação + modelo Linear".to_string(),
            manual_mapping: Some(ManualMapping {
                modelo: Some("SL".to_string()),
                ..Default::default()
            }),
            created_at: now,
            updated_at: now,
        }],
        version: 1,
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  rsc23cl01 "), "RSC23CL01");
    }

    #[test]
    fn test_seed_is_structurally_valid() {
        let seed = seed_snapshot();
        assert!(!seed.exceptions.is_empty());
        let report = integrity::validate_snapshot(&seed);
        assert!(report.is_valid, "{:?}", report.errors);
    }
}
