//! Article catalog
//!
//! Consumes the paginated article listing of the warehouse REST service and
//! pairs every article with its EPW decode. Codes the decoder rejects keep
//! the description the API sent.

use crate::config::DecoderConfig;
use crate::decoder::{self, EpwDecoder};
use crate::error::SourceError;
use crate::resolver::source::{base_url, extract_items, scalar_to_string};
use anyhow::Context;
use async_trait::async_trait;
use epw_types::{AttributeClass, DecodedProduct};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// One article as listed by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub code: String,
    pub description: String,
}

/// One page of the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePage {
    pub items: Vec<Article>,
    pub page: u32,
    pub total_pages: Option<u32>,
    pub total: Option<u64>,
}

impl ArticlePage {
    pub fn has_next(&self) -> bool {
        self.total_pages.map(|t| self.page < t).unwrap_or(false)
    }
}

#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<ArticlePage, SourceError>;
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(alias = "codigo", alias = "strCodigo")]
    code: Option<Value>,
    #[serde(alias = "descricao", alias = "strDescricao")]
    description: Option<Value>,
}

fn parse_article(item: &Value) -> Option<Article> {
    let parsed = serde_json::from_value::<RawArticle>(item.clone())
        .ok()
        .and_then(|raw| {
            let code = raw.code.as_ref().and_then(scalar_to_string)?;
            let description = raw
                .description
                .as_ref()
                .and_then(scalar_to_string)
                .unwrap_or_default();
            Some(Article { code, description })
        })
        .filter(|a| !a.code.is_empty());

    if parsed.is_none() {
        warn!("Skipping article with unrecognized shape: {}", item);
    }
    parsed
}

/// Parse a listing body; paging fields are optional
pub(crate) fn parse_article_page(body: Value, requested_page: u32) -> Result<ArticlePage, SourceError> {
    let page = body
        .get("page")
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(requested_page);
    let total_pages = body
        .get("totalPages")
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok());
    let total = body.get("total").and_then(Value::as_u64);

    let items = extract_items(body)?
        .iter()
        .filter_map(parse_article)
        .collect();

    Ok(ArticlePage {
        items,
        page,
        total_pages,
        total,
    })
}

/// HTTP-backed article listing
pub struct HttpArticleSource {
    client: Client,
    base_url: Url,
}

impl HttpArticleSource {
    pub fn new(config: &DecoderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = base_url(&config.api_base_url)
            .with_context(|| format!("Invalid API base URL '{}'", config.api_base_url))?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ArticleSource for HttpArticleSource {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<ArticlePage, SourceError> {
        let mut url = self.base_url.join("articles")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &page_size.to_string());
        debug!("Fetching articles from {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body: Value = response.json().await?;
        parse_article_page(body, page)
    }
}

/// An article with its decode (when the code is a decodable EPW code)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleView {
    pub code: String,
    pub api_description: String,
    pub decoded: Option<DecodedProduct>,
    pub message: String,
}

impl ArticleView {
    /// Human-readable name: decoded labels, or the API description as-is
    pub fn display_name(&self) -> String {
        match &self.decoded {
            Some(product) => [
                decoder::family_label(product),
                decoder::model_label(product),
                decoder::length_label(product),
                decoder::color_label(product),
                decoder::finish_label(product),
            ]
            .join(" "),
            None if !self.api_description.is_empty() => self.api_description.clone(),
            None => self.code.clone(),
        }
    }
}

pub struct ArticleCatalog {
    source: Arc<dyn ArticleSource>,
    decoder: Arc<EpwDecoder>,
}

impl ArticleCatalog {
    pub fn new(source: Arc<dyn ArticleSource>, decoder: Arc<EpwDecoder>) -> Self {
        Self { source, decoder }
    }

    /// Fetch one page and decode every article on it
    pub async fn describe_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<(ArticlePage, Vec<ArticleView>), SourceError> {
        // Warm every class so the synchronous decodes below see live descriptions
        let (listing, _) = tokio::join!(
            self.source.fetch_page(page, page_size),
            self.decoder.resolver().preload(&AttributeClass::ALL),
        );
        let listing = listing?;

        let views = listing
            .items
            .iter()
            .map(|article| {
                let result = self.decoder.decode(&article.code, false);
                let message = result.message().to_string();
                ArticleView {
                    code: article.code.clone(),
                    api_description: article.description.clone(),
                    decoded: result.into_product(),
                    message,
                }
            })
            .collect();

        Ok((listing, views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AttributeResolver;
    use serde_json::json;

    struct FixedArticles(Vec<Article>);

    #[async_trait]
    impl ArticleSource for FixedArticles {
        async fn fetch_page(&self, page: u32, _page_size: u32) -> Result<ArticlePage, SourceError> {
            Ok(ArticlePage {
                items: self.0.clone(),
                page,
                total_pages: Some(1),
                total: Some(self.0.len() as u64),
            })
        }
    }

    fn article(code: &str, description: &str) -> Article {
        Article {
            code: code.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_parse_wrapped_page() {
        let page = parse_article_page(
            json!({
                "data": [
                    { "strCodigo": "RSC23CL01", "strDescricao": "Régua LED" },
                    { "codigo": "AAA1-23" },
                    { "sku": "nope" },
                ],
                "page": 2,
                "totalPages": 5,
                "total": 42
            }),
            1,
        )
        .unwrap();

        assert_eq!(page.page, 2);
        assert!(page.has_next());
        assert_eq!(page.total, Some(42));
        assert_eq!(
            page.items,
            vec![article("RSC23CL01", "Régua LED"), article("AAA1-23", "")]
        );
    }

    #[test]
    fn test_parse_bare_array_page() {
        let page = parse_article_page(json!([{ "code": "X", "description": "Y" }]), 3).unwrap();
        assert_eq!(page.page, 3);
        assert!(!page.has_next());
    }

    #[test]
    fn test_out_of_range_paging_fields_are_ignored() {
        let page = parse_article_page(
            json!({ "items": [], "page": 4_294_967_298u64, "totalPages": 4_294_967_296u64 }),
            7,
        )
        .unwrap();
        assert_eq!(page.page, 7);
        assert_eq!(page.total_pages, None);
    }

    #[tokio::test]
    async fn test_describe_page_falls_back_to_api_description() {
        let decoder = Arc::new(EpwDecoder::new(Arc::new(AttributeResolver::offline())));
        let catalog = ArticleCatalog::new(
            Arc::new(FixedArticles(vec![
                article("RSC23CL01", "Régua LED 2.3m"),
                article("AAA1-23", "Parafuso M6"),
                article("ABC12345", ""),
            ])),
            decoder,
        );

        let (_, views) = catalog.describe_page(1, 50).await.unwrap();

        assert_eq!(
            views[0].display_name(),
            "Régua Clássico 2300 mm Cinza Lacado"
        );
        assert!(views[1].decoded.is_none());
        assert_eq!(views[1].display_name(), "Parafuso M6");
        assert_eq!(views[2].display_name(), "ABC12345");
    }
}
