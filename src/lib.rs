//! EPW Decoder - article code decoding for the warehouse catalogue
//!
//! Decodes compact EPW article codes (7 to 11 characters) into six
//! attributes: type, certification, model, length, color and finish.
//!
//! ## Architecture
//!
//! ```text
//! raw code ─► EpwDecoder ─► exception table / special case / validation
//!                  │
//!                  └─► segment parser ─► AttributeResolver (sync lookup)
//!                                            │
//!                           dictionary ◄─────┴────► cache ◄── remote service
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use epw_decoder::{AttributeResolver, EpwDecoder};
//!
//! let decoder = EpwDecoder::new(Arc::new(AttributeResolver::offline()));
//! let result = decoder.decode("RSC23CL01", false);
//! assert!(result.success());
//! ```

// Core error handling and configuration
pub mod config;
pub mod error;

// Persistence backends shared by the exception table and the attribute cache
pub mod store;

// Attribute descriptions: static fallback + cached remote data
pub mod dictionary;
pub mod resolver;

// Decoding
pub mod decoder;
pub mod parser;

// User-maintained overrides
pub mod exceptions;

// Paginated article listing consumer
pub mod catalog;

pub use catalog::{Article, ArticleCatalog, ArticlePage, ArticleSource, ArticleView, HttpArticleSource};
pub use config::DecoderConfig;
pub use decoder::{
    color_label, family_label, finish_label, length_label, model_label, EpwDecoder,
};
pub use error::{EpwError, ExceptionError, SourceError, StoreError};
pub use exceptions::{ExceptionStats, ExceptionStore};
pub use resolver::{AttributeResolver, AttributeSource, Describe, HttpAttributeSource, StaticDescriber};
pub use store::{FileStore, KvStore, MemoryStore};

pub use epw_types::{
    AttributeClass, AttributeEntry, BackupEnvelope, BackupSource, DecodeRejection, DecodeResult,
    DecodedProduct, ExceptionRecord, ExceptionSnapshot, IntegrityReport, ManualMapping,
    SegmentError, SplitStrategy, SplitTrace,
};
