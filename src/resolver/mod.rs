//! Attribute resolution
//!
//! Turns raw segment codes into descriptions, merging the static
//! dictionary with data fetched from the warehouse REST service.

pub mod cache;
pub mod service;
pub mod source;

pub use cache::{CacheEntry, CacheStats};
pub use service::AttributeResolver;
pub use source::{AttributeSource, HttpAttributeSource};

use epw_types::AttributeClass;

/// Synchronous `(class, code) -> description` lookup.
///
/// Implementations return the code itself when nothing better is known.
pub trait Describe {
    fn describe(&self, class: AttributeClass, code: &str) -> String;
}

/// Dictionary-only describer, for callers without a resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDescriber;

impl Describe for StaticDescriber {
    fn describe(&self, class: AttributeClass, code: &str) -> String {
        crate::dictionary::lookup(class, code)
            .map(str::to_string)
            .unwrap_or_else(|| code.to_string())
    }
}
