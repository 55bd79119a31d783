//! Decoder configuration
//!
//! Defaults come from the environment so the CLI and embedding services can
//! be configured without code changes (`.env` is loaded by the binary).

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STORE_DIR: &str = ".epw";

#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Base URL of the attributes / articles REST service
    pub api_base_url: String,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// Lifetime of in-memory attribute cache entries
    pub cache_ttl: Duration,
    /// Directory backing the file key-value store
    pub store_dir: PathBuf,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("EPW_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            http_timeout: Duration::from_secs(env_u64(
                "EPW_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            cache_ttl: Duration::from_secs(env_u64("EPW_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
            store_dir: std::env::var("EPW_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_DIR)),
        }
    }
}

impl DecoderConfig {
    /// Read configuration from the environment
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Persisted (second-tier) attribute cache lifetime: twice the in-memory TTL
    pub fn persisted_cache_ttl(&self) -> Duration {
        self.cache_ttl * 2
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
