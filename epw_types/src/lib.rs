//! EPW Types - Foundation Types for the EPW Decoder
//!
//! Pure data structures shared by the decoder, the exception store and the
//! command-line tool. Nothing in here performs I/O or decoding.
//!
//! ## Contents
//!
//! - Attribute classes and resolved attribute entries
//! - Decoded products and the decode result envelope
//! - Exception records, snapshots and backup envelopes
//! - Rejection / segment errors surfaced through `DecodeResult`
//!
//! ## Rules
//!
//! 1. **NO BUSINESS LOGIC** - only data structures, constructors and accessors
//! 2. **NO WORKSPACE DEPENDENCIES**
//! 3. **SERIALIZABLE** - the JSON shape matches what the warehouse web client
//!    persists (`l`/`d` entries, camelCase snapshot fields)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// ATTRIBUTE CLASSES
// ============================================================================

/// One of the six semantic categories a code segment maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeClass {
    /// `tipo` - product type, 1 or 2 leading characters
    Tipo,
    /// `certif` - certification, 1 character after the type
    Certif,
    /// `modelo` - model, whatever remains of the front part
    Modelo,
    /// `comprim` - length, 2 characters
    Comprim,
    /// `cor` - colour, 1 character
    Cor,
    /// `acabamento` - finish, 1 character
    Acabamento,
}

impl AttributeClass {
    /// All classes in code order (front to back)
    pub const ALL: [AttributeClass; 6] = [
        AttributeClass::Tipo,
        AttributeClass::Certif,
        AttributeClass::Modelo,
        AttributeClass::Comprim,
        AttributeClass::Cor,
        AttributeClass::Acabamento,
    ];

    /// Key used by the attributes REST service and the persisted cache
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeClass::Tipo => "tipo",
            AttributeClass::Certif => "certif",
            AttributeClass::Modelo => "modelo",
            AttributeClass::Comprim => "comprim",
            AttributeClass::Cor => "cor",
            AttributeClass::Acabamento => "acabamento",
        }
    }

    /// English label for logs and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            AttributeClass::Tipo => "type",
            AttributeClass::Certif => "certification",
            AttributeClass::Modelo => "model",
            AttributeClass::Comprim => "length",
            AttributeClass::Cor => "color",
            AttributeClass::Acabamento => "finish",
        }
    }
}

impl fmt::Display for AttributeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tipo" | "type" => Ok(AttributeClass::Tipo),
            "certif" | "certification" => Ok(AttributeClass::Certif),
            "modelo" | "model" => Ok(AttributeClass::Modelo),
            "comprim" | "length" => Ok(AttributeClass::Comprim),
            "cor" | "color" => Ok(AttributeClass::Cor),
            "acabamento" | "finish" => Ok(AttributeClass::Acabamento),
            other => Err(format!("unknown attribute class '{}'", other)),
        }
    }
}

// ============================================================================
// ATTRIBUTE ENTRIES AND DECODED PRODUCTS
// ============================================================================

/// A resolved `{code, description}` pair
///
/// Serialized as `{ "l": ..., "d": ... }`, the shape the web client stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeEntry {
    #[serde(rename = "l")]
    pub code: String,
    #[serde(rename = "d")]
    pub description: String,
}

impl AttributeEntry {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Entry whose description is the raw code itself (no mapping known)
    pub fn raw(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            description: code.clone(),
            code,
        }
    }

    /// True when neither code nor description carry anything
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.description.is_empty()
    }

    /// True when a real mapping was found (description differs from code)
    pub fn is_mapped(&self) -> bool {
        self.description != self.code
    }
}

/// Full decode of one EPW code: one entry per attribute class
///
/// Unknown codes describe as themselves. The one exception is a 7-character
/// code, whose single front character leaves certification and model empty;
/// the display helpers give those fields fallback labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecodedProduct {
    #[serde(rename = "tipo")]
    pub kind: AttributeEntry,
    #[serde(rename = "certif")]
    pub certification: AttributeEntry,
    #[serde(rename = "modelo")]
    pub model: AttributeEntry,
    #[serde(rename = "comprim")]
    pub length: AttributeEntry,
    #[serde(rename = "cor")]
    pub color: AttributeEntry,
    #[serde(rename = "acabamento")]
    pub finish: AttributeEntry,
}

impl Default for AttributeEntry {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl DecodedProduct {
    /// Get the entry for one class
    pub fn get(&self, class: AttributeClass) -> &AttributeEntry {
        match class {
            AttributeClass::Tipo => &self.kind,
            AttributeClass::Certif => &self.certification,
            AttributeClass::Modelo => &self.model,
            AttributeClass::Comprim => &self.length,
            AttributeClass::Cor => &self.color,
            AttributeClass::Acabamento => &self.finish,
        }
    }

    /// Replace the entry for one class
    pub fn set(&mut self, class: AttributeClass, entry: AttributeEntry) {
        match class {
            AttributeClass::Tipo => self.kind = entry,
            AttributeClass::Certif => self.certification = entry,
            AttributeClass::Modelo => self.model = entry,
            AttributeClass::Comprim => self.length = entry,
            AttributeClass::Cor => self.color = entry,
            AttributeClass::Acabamento => self.finish = entry,
        }
    }

    /// Iterate `(class, entry)` pairs in code order
    pub fn entries(&self) -> impl Iterator<Item = (AttributeClass, &AttributeEntry)> {
        AttributeClass::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

// ============================================================================
// SEGMENT SPLITS
// ============================================================================

/// Candidate decomposition of the variable-width front part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// Type = 1 char, certification = 1 char, model = rest
    SingleCharType,
    /// Type = 2 chars, certification = 1 char, model = rest
    DoubleCharType,
}

impl SplitStrategy {
    /// Width of the type segment under this strategy
    pub fn type_width(&self) -> usize {
        match self {
            SplitStrategy::SingleCharType => 1,
            SplitStrategy::DoubleCharType => 2,
        }
    }
}

/// One scored candidate split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCandidate {
    pub strategy: SplitStrategy,
    pub tipo: String,
    pub certif: String,
    pub modelo: String,
    pub score: u32,
}

/// Debug trace of how the front part was disambiguated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTrace {
    pub front: String,
    pub candidates: Vec<SplitCandidate>,
    pub chosen: SplitStrategy,
}

// ============================================================================
// DECODE RESULT
// ============================================================================

/// Structural problems found while splitting a code into segments
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentError {
    #[error("Invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("Code too short to split: {length} characters")]
    TooShort { length: usize },
}

/// Why a code was not decoded
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeRejection {
    #[error("Empty code")]
    Empty,

    #[error("Code '{code}' is not in EPW format")]
    ForeignFormat { code: String },

    #[error("Invalid code length: {length} characters (expected 7 to 11)")]
    UnsupportedLength { code: String, length: usize },

    #[error("Failed to decode: {0}")]
    Segment(#[from] SegmentError),
}

/// Outcome of decoding one code; failures are values, never panics
///
/// Built only through [`DecodeResult::decoded`] and [`DecodeResult::rejected`],
/// so a success always carries a product and a failure always carries its
/// rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<DecodedProduct>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<DecodeRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<SplitTrace>,
}

impl DecodeResult {
    /// Successful decode
    pub fn decoded(product: DecodedProduct, message: impl Into<String>) -> Self {
        Self {
            success: true,
            product: Some(product),
            message: message.into(),
            rejection: None,
            trace: None,
        }
    }

    /// Failed decode; the message is the rejection's display text
    pub fn rejected(rejection: DecodeRejection) -> Self {
        Self {
            success: false,
            product: None,
            message: rejection.to_string(),
            rejection: Some(rejection),
            trace: None,
        }
    }

    /// Attach a split trace (debug decodes only)
    pub fn with_trace(mut self, trace: Option<SplitTrace>) -> Self {
        self.trace = trace;
        self
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn product(&self) -> Option<&DecodedProduct> {
        self.product.as_ref()
    }

    pub fn into_product(self) -> Option<DecodedProduct> {
        self.product
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn rejection(&self) -> Option<&DecodeRejection> {
        self.rejection.as_ref()
    }

    pub fn trace(&self) -> Option<&SplitTrace> {
        self.trace.as_ref()
    }
}

// ============================================================================
// EXCEPTIONS
// ============================================================================

/// Partial set of raw attribute codes entered by a user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManualMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certif: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acabamento: Option<String>,
}

impl ManualMapping {
    /// Manual raw code for one class, ignoring blank values
    pub fn get(&self, class: AttributeClass) -> Option<&str> {
        let value = match class {
            AttributeClass::Tipo => &self.tipo,
            AttributeClass::Certif => &self.certif,
            AttributeClass::Modelo => &self.modelo,
            AttributeClass::Comprim => &self.comprim,
            AttributeClass::Cor => &self.cor,
            AttributeClass::Acabamento => &self.acabamento,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Builder-style setter
    pub fn with(mut self, class: AttributeClass, code: impl Into<String>) -> Self {
        let code = Some(code.into());
        match class {
            AttributeClass::Tipo => self.tipo = code,
            AttributeClass::Certif => self.certif = code,
            AttributeClass::Modelo => self.modelo = code,
            AttributeClass::Comprim => self.comprim = code,
            AttributeClass::Cor => self.cor = code,
            AttributeClass::Acabamento => self.acabamento = code,
        }
        self
    }

    /// True when every class has a manual value
    pub fn is_complete(&self) -> bool {
        AttributeClass::ALL.iter().all(|c| self.get(*c).is_some())
    }

    /// True when no class has a manual value
    pub fn is_empty(&self) -> bool {
        AttributeClass::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

/// A user-maintained override for one code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    /// Normalized (trimmed, uppercase) code
    pub code: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_mapping: Option<ManualMapping>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// The whole exception table as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionSnapshot {
    pub exceptions: Vec<ExceptionRecord>,
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u64 {
    1
}

impl ExceptionSnapshot {
    /// Find a record by already-normalized code
    pub fn find(&self, code: &str) -> Option<&ExceptionRecord> {
        self.exceptions.iter().find(|r| r.code == code)
    }
}

/// Origin of a backup envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupSource {
    Manual,
    Auto,
    Export,
}

impl BackupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupSource::Manual => "manual",
            BackupSource::Auto => "auto",
            BackupSource::Export => "export",
        }
    }
}

/// Snapshot wrapped with backup metadata; also the export/import file format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEnvelope {
    pub data: ExceptionSnapshot,
    pub backup_date: DateTime<Utc>,
    pub version: u64,
    pub source: BackupSource,
}

/// Result of a structural check over the exception table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_class_round_trips_through_str() {
        for class in AttributeClass::ALL {
            assert_eq!(class.as_str().parse::<AttributeClass>(), Ok(class));
        }
        assert_eq!("finish".parse::<AttributeClass>(), Ok(AttributeClass::Acabamento));
        assert!("colour".parse::<AttributeClass>().is_err());
    }

    #[test]
    fn test_entry_serializes_as_l_d() {
        let entry = AttributeEntry::new("--", "Genérico");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({ "l": "--", "d": "Genérico" }));
    }

    #[test]
    fn test_raw_entry_is_not_mapped() {
        let entry = AttributeEntry::raw("ZZ");
        assert_eq!(entry.description, "ZZ");
        assert!(!entry.is_mapped());
        assert!(AttributeEntry::new("R", "Régua").is_mapped());
    }

    #[test]
    fn test_product_get_set_by_class() {
        let mut product = DecodedProduct::default();
        product.set(AttributeClass::Cor, AttributeEntry::new("B", "Branco"));
        assert_eq!(product.get(AttributeClass::Cor).description, "Branco");
        assert_eq!(product.color.code, "B");
        assert_eq!(product.entries().count(), 6);
    }

    #[test]
    fn test_manual_mapping_ignores_blank_values() {
        let mapping = ManualMapping {
            modelo: Some("  ".to_string()),
            ..Default::default()
        }
        .with(AttributeClass::Tipo, "R");

        assert_eq!(mapping.get(AttributeClass::Tipo), Some("R"));
        assert_eq!(mapping.get(AttributeClass::Modelo), None);
        assert!(!mapping.is_complete());
        assert!(!mapping.is_empty());
    }

    #[test]
    fn test_record_accepts_missing_timestamps() {
        let record: ExceptionRecord =
            serde_json::from_str(r#"{ "code": "ABC1234", "reason": "irregular" }"#).unwrap();
        assert_eq!(record.code, "ABC1234");
        assert!(record.manual_mapping.is_none());
    }

    #[test]
    fn test_decoded_result_always_carries_product() {
        let result = DecodeResult::decoded(DecodedProduct::default(), "ok");
        assert!(result.success());
        assert!(result.product().is_some());
        assert!(result.rejection().is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], serde_json::json!(true));
        assert!(json.get("rejection").is_none());
    }

    #[test]
    fn test_rejection_message_names_length() {
        let result = DecodeResult::rejected(DecodeRejection::UnsupportedLength {
            code: "ABC".to_string(),
            length: 3,
        });
        assert!(!result.success());
        assert!(result.message().contains('3'));
        assert!(result.product().is_none());
    }
}
