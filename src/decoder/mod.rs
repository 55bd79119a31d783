//! EPW decode facade
//!
//! Single entry point turning a raw article code into a `DecodeResult`:
//!
//! ```text
//! raw code
//!    │ trim + uppercase
//!    ├─► complete manual exception?  ──► decoded from exception
//!    ├─► foreign code family?        ──► rejected
//!    ├─► built-in special case?      ──► fixed product
//!    ├─► length outside 7..=11?      ──► rejected
//!    └─► segment parser ──► partial exception override ──► decoded
//! ```
//!
//! Decoding is synchronous and never touches the network: descriptions come
//! from whatever the resolver already has (call `preload` before bulk work).

pub mod display;

pub use display::{color_label, family_label, finish_label, length_label, model_label};

use crate::exceptions::{normalize_code, ExceptionStore};
use crate::parser::{self, MAX_CODE_LENGTH, MIN_CODE_LENGTH};
use crate::resolver::AttributeResolver;
use epw_types::{AttributeEntry, DecodeRejection, DecodeResult, DecodedProduct};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Three letters followed only by digits: catalogue references from another family
static FOREIGN_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}[0-9]+$").unwrap());

/// Historical code whose segments do not follow the layout at all
pub const SPECIAL_CASE_CODE: &str = "OSACAN001";

/// Fixed decode of [`SPECIAL_CASE_CODE`]
pub fn special_case_product() -> DecodedProduct {
    DecodedProduct {
        kind: AttributeEntry::new("O", "Outros"),
        certification: AttributeEntry::new("S", "Sem"),
        model: AttributeEntry::new("--", "Genérico"),
        length: AttributeEntry::new("--", "Sem comprimento"),
        color: AttributeEntry::new("--", "Sem cor"),
        finish: AttributeEntry::new("--", "Sem acabamento"),
    }
}

/// True for codes that structurally belong to a different code family
pub fn is_foreign_format(code: &str) -> bool {
    code.contains('-') || FOREIGN_CODE_RE.is_match(code)
}

pub struct EpwDecoder {
    resolver: Arc<AttributeResolver>,
    exceptions: Option<Arc<ExceptionStore>>,
}

impl EpwDecoder {
    pub fn new(resolver: Arc<AttributeResolver>) -> Self {
        Self {
            resolver,
            exceptions: None,
        }
    }

    /// Consult `exceptions` before and after automatic decoding
    pub fn with_exceptions(mut self, exceptions: Arc<ExceptionStore>) -> Self {
        self.exceptions = Some(exceptions);
        self
    }

    pub fn resolver(&self) -> &AttributeResolver {
        &self.resolver
    }

    pub fn exceptions(&self) -> Option<&ExceptionStore> {
        self.exceptions.as_deref()
    }

    /// Decode one code; `debug` attaches the split trace and logs the scoring
    pub fn decode(&self, raw: &str, debug: bool) -> DecodeResult {
        if raw.trim().is_empty() {
            return DecodeResult::rejected(DecodeRejection::Empty);
        }
        let code = normalize_code(raw);

        let exception = self.exceptions.as_ref().and_then(|store| store.get(&code));
        if let Some(record) = &exception {
            if record
                .manual_mapping
                .as_ref()
                .is_some_and(|m| m.is_complete())
            {
                debug!("{}: decoded entirely from manual exception", code);
                let product = self.apply_exception(&code, DecodedProduct::default());
                return DecodeResult::decoded(
                    product,
                    format!("Decoded from manual exception: {}", record.reason),
                );
            }
        }

        if is_foreign_format(&code) {
            return DecodeResult::rejected(DecodeRejection::ForeignFormat { code });
        }

        if code == SPECIAL_CASE_CODE {
            return DecodeResult::decoded(special_case_product(), "Decoded special-case code");
        }

        let length = code.chars().count();
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
            return DecodeResult::rejected(DecodeRejection::UnsupportedLength { code, length });
        }

        let (product, trace) = match parser::decode_segments(&code, self.resolver.as_ref()) {
            Ok(decoded) => decoded,
            Err(e) => return DecodeResult::rejected(DecodeRejection::Segment(e)),
        };
        if debug {
            debug!("{}: chose {:?} for front '{}'", code, trace.chosen, trace.front);
        }

        let result = match exception {
            Some(record) => DecodeResult::decoded(
                self.apply_exception(&code, product),
                format!("Decoded with exception: {}", record.reason),
            ),
            None => DecodeResult::decoded(product, "Decoded successfully"),
        };
        result.with_trace(debug.then_some(trace))
    }

    /// Decode many codes; one bad code never affects the others
    pub fn decode_all<'a, I>(&self, codes: I, debug: bool) -> Vec<DecodeResult>
    where
        I: IntoIterator<Item = &'a str>,
    {
        codes.into_iter().map(|c| self.decode(c, debug)).collect()
    }

    fn apply_exception(&self, code: &str, product: DecodedProduct) -> DecodedProduct {
        match &self.exceptions {
            Some(store) => store.apply_override(code, product, self.resolver.as_ref()),
            None => product,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use epw_types::{AttributeClass, ManualMapping, SplitStrategy};

    fn decoder() -> EpwDecoder {
        EpwDecoder::new(Arc::new(AttributeResolver::offline()))
    }

    fn decoder_with_exceptions() -> (EpwDecoder, Arc<ExceptionStore>) {
        let exceptions = Arc::new(ExceptionStore::open(Arc::new(MemoryStore::new())));
        (decoder().with_exceptions(exceptions.clone()), exceptions)
    }

    #[test]
    fn test_foreign_format_detection() {
        assert!(is_foreign_format("AAA1-23"));
        assert!(is_foreign_format("ABC12345"));
        assert!(!is_foreign_format("RSC23CL01"));
        assert!(!is_foreign_format("OSACAN001"));
    }

    #[test]
    fn test_special_case_code() {
        let result = decoder().decode("osacan001", false);
        assert!(result.success());
        let product = result.product().unwrap();
        assert_eq!(product.model.code, "--");
        assert_eq!(product.model.description, "Genérico");
    }

    #[test]
    fn test_empty_and_blank_input() {
        for raw in ["", "   "] {
            let result = decoder().decode(raw, false);
            assert!(!result.success());
            assert_eq!(result.rejection(), Some(&DecodeRejection::Empty));
        }
    }

    #[test]
    fn test_length_bounds() {
        let d = decoder();
        assert!(!d.decode("RS23CL", false).success());
        assert!(d.decode("RS23CL0", false).success());
        assert!(d.decode("RSCMMM23CL0", false).success());

        let result = d.decode("RSCMMMM23CL01", false);
        assert!(!result.success());
        assert!(result.message().contains("13"), "{}", result.message());
    }

    #[test]
    fn test_invalid_character_is_a_failure_result() {
        let result = decoder().decode("RS.23CL01", false);
        assert!(!result.success());
        assert!(matches!(
            result.rejection(),
            Some(DecodeRejection::Segment(_))
        ));
    }

    #[test]
    fn test_debug_attaches_trace() {
        let d = decoder();
        assert!(d.decode("RSC23CL01", false).trace().is_none());

        let result = d.decode("RSC23CL01", true);
        let trace = result.trace().unwrap();
        assert_eq!(trace.chosen, SplitStrategy::SingleCharType);
        assert_eq!(trace.candidates.len(), 2);
    }

    #[test]
    fn test_partial_exception_overrides_one_field() {
        let (d, exceptions) = decoder_with_exceptions();
        exceptions
            .upsert(
                "RSC23CL01",
                "really a slim model",
                Some(ManualMapping::default().with(AttributeClass::Modelo, "SL")),
            )
            .unwrap();

        let result = d.decode("RSC23CL01", false);
        assert!(result.success());
        assert!(result.message().contains("really a slim model"));
        let product = result.product().unwrap();
        assert_eq!(product.model, AttributeEntry::new("SL", "Slim"));
        assert_eq!(product.kind, AttributeEntry::new("R", "Régua"));
    }

    #[test]
    fn test_complete_exception_short_circuits_rejections() {
        let (d, exceptions) = decoder_with_exceptions();
        let mapping = ManualMapping::default()
            .with(AttributeClass::Tipo, "T")
            .with(AttributeClass::Certif, "S")
            .with(AttributeClass::Modelo, "R")
            .with(AttributeClass::Comprim, "60")
            .with(AttributeClass::Cor, "N")
            .with(AttributeClass::Acabamento, "N");
        exceptions
            .upsert("TUB-60", "legacy tube reference", Some(mapping))
            .unwrap();

        let result = d.decode("tub-60", false);
        assert!(result.success(), "{}", result.message());
        let product = result.product().unwrap();
        assert_eq!(product.kind.description, "Tubo");
        assert_eq!(product.length.description, "6000 mm");
    }

    #[test]
    fn test_reason_only_exception_keeps_automatic_decode() {
        let (d, exceptions) = decoder_with_exceptions();
        exceptions.upsert("RSC23CL01", "checked by hand", None).unwrap();

        let plain = decoder().decode("RSC23CL01", false);
        let excepted = d.decode("RSC23CL01", false);
        assert_eq!(excepted.product(), plain.product());
        assert!(excepted.message().contains("checked by hand"));
    }

    #[test]
    fn test_seeded_exception_corrects_parser() {
        let (d, _) = decoder_with_exceptions();

        let plain = decoder().decode("PSL23BA01", false).into_product().unwrap();
        assert_eq!(plain.model.code, "L");

        let corrected = d.decode("PSL23BA01", false).into_product().unwrap();
        assert_eq!(corrected.model, AttributeEntry::new("SL", "Slim"));
    }

    #[test]
    fn test_decode_all_isolates_failures() {
        let results = decoder().decode_all(["RSC23CL01", "", "AAA1-23", "CHSM23CL01"], false);
        let successes: Vec<bool> = results.iter().map(|r| r.success()).collect();
        assert_eq!(successes, vec![true, false, false, true]);
    }
}
