//! Error handling for the EPW decoder
//!
//! Typed errors per concern using thiserror. Decoding itself never returns
//! these: decode failures are `DecodeResult` values. These errors cover the
//! persistence backend, the remote service and invalid exception input.

use thiserror::Error;

pub use epw_types::{DecodeRejection, SegmentError};

/// Main error type for the decoder crate
#[derive(Error, Debug)]
pub enum EpwError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Exception error: {0}")]
    Exception(#[from] ExceptionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value backend failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("IO error on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Write rejected for key '{key}'")]
    Rejected { key: String },
}

/// Remote attribute / article service failures
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unrecognized response shape: {0}")]
    Shape(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Invalid input to the exception store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExceptionError {
    #[error("Exception code must not be empty")]
    EmptyCode,

    #[error("Exception reason must not be empty")]
    EmptyReason,
}

pub type Result<T> = std::result::Result<T, EpwError>;
