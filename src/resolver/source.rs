//! Remote attribute source
//!
//! Fetches `{code, description}` lists per attribute class from the
//! warehouse REST service. Response parsing is lenient: the list may be
//! bare or wrapped, and items may use any of the known field spellings.

use crate::config::DecoderConfig;
use crate::error::SourceError;
use anyhow::Context;
use async_trait::async_trait;
use epw_types::{AttributeClass, AttributeEntry};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Anything that can produce the authoritative entries for a class
#[async_trait]
pub trait AttributeSource: Send + Sync {
    async fn fetch(&self, class: AttributeClass) -> Result<Vec<AttributeEntry>, SourceError>;
}

/// `{code,description}` / `{codigo,descricao}` / `{strCodigo,strDescricao}`
#[derive(Debug, Deserialize)]
struct RawAttribute {
    #[serde(alias = "codigo", alias = "strCodigo")]
    code: Option<Value>,
    #[serde(alias = "descricao", alias = "strDescricao")]
    description: Option<Value>,
}

/// Keys under which a list may be wrapped
const WRAPPER_KEYS: [&str; 3] = ["data", "items", "results"];

/// Unwrap a response body into its list of items
pub(crate) fn extract_items(body: Value) -> Result<Vec<Value>, SourceError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                SourceError::Shape(format!(
                    "object without a list under {:?}",
                    WRAPPER_KEYS
                ))
            }),
        other => Err(SourceError::Shape(format!(
            "expected list or object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Normalized string form of a scalar JSON value
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse one item; `None` (with a warning) for unrecognized shapes
pub(crate) fn parse_attribute(item: &Value) -> Option<AttributeEntry> {
    let parsed = serde_json::from_value::<RawAttribute>(item.clone())
        .ok()
        .and_then(|raw| {
            let code = raw.code.as_ref().and_then(scalar_to_string)?;
            let description = raw.description.as_ref().and_then(scalar_to_string)?;
            Some(AttributeEntry::new(code.to_uppercase(), description))
        })
        .filter(|entry| !entry.code.is_empty());

    if parsed.is_none() {
        warn!("Skipping attribute item with unrecognized shape: {}", item);
    }
    parsed
}

/// Parse a whole response body into entries
pub(crate) fn parse_attribute_list(body: Value) -> Result<Vec<AttributeEntry>, SourceError> {
    Ok(extract_items(body)?
        .iter()
        .filter_map(parse_attribute)
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Base URL with a trailing slash so relative joins append
pub(crate) fn base_url(raw: &str) -> Result<Url, SourceError> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// HTTP-backed attribute source
pub struct HttpAttributeSource {
    client: Client,
    base_url: Url,
}

impl HttpAttributeSource {
    pub fn new(config: &DecoderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = base_url(&config.api_base_url)
            .with_context(|| format!("Invalid API base URL '{}'", config.api_base_url))?;

        Ok(Self { client, base_url })
    }

    fn url_for(&self, class: AttributeClass) -> Result<Url, SourceError> {
        Ok(self.base_url.join(&format!("attributes/{}", class.as_str()))?)
    }
}

#[async_trait]
impl AttributeSource for HttpAttributeSource {
    async fn fetch(&self, class: AttributeClass) -> Result<Vec<AttributeEntry>, SourceError> {
        let url = self.url_for(class)?;
        debug!("Fetching {} attributes from {}", class, url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body: Value = response.json().await?;
        let entries = parse_attribute_list(body)?;
        debug!("Fetched {} {} attributes", entries.len(), class);
        Ok(entries)
    }
}
