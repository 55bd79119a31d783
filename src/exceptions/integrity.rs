//! Structural validation of exception snapshots
//!
//! Works on raw JSON so that a persisted snapshot too broken to deserialize
//! still gets a precise report instead of silently falling back to the seed.

use super::normalize_code;
use epw_types::{ExceptionSnapshot, IntegrityReport};
use serde_json::Value;
use std::collections::HashSet;

/// Validate an in-memory snapshot
pub fn validate_snapshot(snapshot: &ExceptionSnapshot) -> IntegrityReport {
    match serde_json::to_value(snapshot) {
        Ok(value) => validate_value(&value),
        Err(e) => IntegrityReport::from_errors(vec![format!("snapshot not serializable: {}", e)]),
    }
}

/// Validate a raw persisted snapshot
pub fn validate_raw(raw: &str) -> IntegrityReport {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => validate_value(&value),
        Err(e) => IntegrityReport::from_errors(vec![format!("snapshot is not valid JSON: {}", e)]),
    }
}

pub fn validate_value(value: &Value) -> IntegrityReport {
    let mut errors = Vec::new();

    let Some(object) = value.as_object() else {
        return IntegrityReport::from_errors(vec!["snapshot is not a JSON object".to_string()]);
    };

    if let Some(version) = object.get("version") {
        if !version.is_u64() {
            errors.push("version is not a non-negative integer".to_string());
        }
    }

    let Some(records) = object.get("exceptions").and_then(Value::as_array) else {
        errors.push("exceptions is missing or not an array".to_string());
        return IntegrityReport::from_errors(errors);
    };

    let mut seen = HashSet::new();
    for (i, record) in records.iter().enumerate() {
        let Some(record) = record.as_object() else {
            errors.push(format!("exception #{} is not an object", i));
            continue;
        };

        match record.get("code").and_then(Value::as_str) {
            Some(code) if !code.trim().is_empty() => {
                if normalize_code(code) != code {
                    errors.push(format!("exception #{} code '{}' is not normalized", i, code));
                }
                if !seen.insert(normalize_code(code)) {
                    errors.push(format!("exception #{} duplicates code '{}'", i, code));
                }
            }
            _ => errors.push(format!("exception #{} has no code", i)),
        }

        match record.get("reason").and_then(Value::as_str) {
            Some(reason) if !reason.trim().is_empty() => {}
            _ => errors.push(format!("exception #{} has no reason", i)),
        }

        if let Some(mapping) = record.get("manualMapping") {
            if !mapping.is_object() && !mapping.is_null() {
                errors.push(format!("exception #{} manualMapping is not an object", i));
            }
        }
    }

    IntegrityReport::from_errors(errors)
}
