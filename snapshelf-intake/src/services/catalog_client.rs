//! Remote catalog client
//!
//! Talks to a Shopify-compatible Admin REST API:
//! - `GET  {base}/products.json` to find draft items with no images
//! - `POST {base}/products/{id}/images.json` once per image, in gallery order
//! - `PUT  {base}/products/{id}.json` to activate and publish the item
//!
//! Every request waits for a rate limiter permit and carries the client timeout.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::models::{CatalogItem, ImageUpload};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const USER_AGENT: &str = concat!("SnapShelf/", env!("CARGO_PKG_VERSION"));
/// Page size used when scanning for items missing photos
const SCAN_PAGE_SIZE: usize = 250;

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CatalogError::Network(format!("timed out: {}", e))
        } else if e.is_decode() {
            CatalogError::Parse(e.to_string())
        } else {
            CatalogError::Network(e.to_string())
        }
    }
}

/// Operations the intake session needs from the remote catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Items without photos, newest first, at most `limit`
    ///
    /// `filter` matches title or SKU case-insensitively.
    async fn list_recent_items_missing_photos(
        &self,
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Attach images to the item; slice order is gallery order
    async fn upload_images(&self, item_id: &str, images: &[ImageUpload])
        -> Result<(), CatalogError>;

    /// Make the item visible in the storefront
    async fn publish(&self, item_id: &str) -> Result<(), CatalogError>;
}

/// Product as returned by `products.json`
#[derive(Debug, Deserialize)]
struct ApiProduct {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    #[serde(default)]
    title: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    variants: Vec<ApiVariant>,
    #[serde(default)]
    images: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiVariant {
    #[serde(default)]
    sku: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiProductList {
    products: Vec<ApiProduct>,
}

/// Product ids arrive as JSON numbers; keep them opaque strings
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected id type: {}",
            other
        ))),
    }
}

impl ApiProduct {
    fn first_sku(&self) -> Option<String> {
        self.variants
            .iter()
            .filter_map(|v| v.sku.as_deref())
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn into_item(self) -> CatalogItem {
        let sku = self.first_sku();
        CatalogItem {
            id: self.id,
            title: self.title,
            sku,
            created_at: self.created_at,
        }
    }
}

/// Keep items without images that match the filter, newest first
fn select_missing_photos(
    products: Vec<ApiProduct>,
    limit: usize,
    filter: Option<&str>,
) -> Vec<CatalogItem> {
    let needle = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase);

    let mut items: Vec<CatalogItem> = products
        .into_iter()
        .filter(|p| p.images.is_empty())
        .map(ApiProduct::into_item)
        .filter(|item| match &needle {
            Some(needle) => {
                item.title.to_lowercase().contains(needle)
                    || item
                        .sku
                        .as_deref()
                        .is_some_and(|sku| sku.to_lowercase().contains(needle))
            }
            None => true,
        })
        .collect();

    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items.truncate(limit);
    items
}

/// HTTP implementation of [`CatalogClient`]
pub struct HttpCatalogClient {
    /// HTTP client with configured timeouts
    client: Client,
    /// Admin API base URL, no trailing slash
    base_url: String,
    access_token: String,
    timeout: Duration,
    rate_limiter: governor::DefaultDirectRateLimiter,
}

impl HttpCatalogClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `base_url` - e.g. `https://shop.example.com/admin/api/2024-10`
    /// * `access_token` - Admin API token
    /// * `timeout` - Total per-request timeout
    /// * `requests_per_second` - Outbound request budget (0 is treated as 1)
    pub fn new(
        base_url: &str,
        access_token: &str,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, CatalogError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CatalogError::Config("catalog base URL is empty".to_string()));
        }
        if access_token.trim().is_empty() {
            return Err(CatalogError::Config("catalog access token is empty".to_string()));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .build()
            .map_err(|e| CatalogError::Config(e.to_string()))?;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            base_url,
            access_token: access_token.trim().to_string(),
            timeout,
            rate_limiter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/products/{id}{suffix}` with the id as one escaped path segment
    fn product_url(&self, item_id: &str, suffix: &str) -> String {
        format!(
            "{}/products/{}{}",
            self.base_url,
            urlencoding::encode(item_id),
            suffix
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> CatalogError {
        if e.is_timeout() {
            CatalogError::Timeout(self.timeout)
        } else {
            CatalogError::from(e)
        }
    }

    /// Turn a non-success status into an error
    async fn check_status(response: Response, item_id: Option<&str>) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = item_id {
                return Err(CatalogError::ItemNotFound(id.to_string()));
            }
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::RateLimited);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::Api(status.as_u16(), body))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_recent_items_missing_photos(
        &self,
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/products.json", self.base_url);
        tracing::debug!(url = %url, limit, filter = ?filter, "Listing catalog items missing photos");

        let page_size = SCAN_PAGE_SIZE.to_string();
        let response = self
            .client
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .query(&[
                ("status", "draft"),
                ("limit", page_size.as_str()),
                ("order", "created_at desc"),
                ("fields", "id,title,created_at,variants,images"),
            ])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response, None).await?;
        let list: ApiProductList = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(select_missing_photos(list.products, limit, filter))
    }

    async fn upload_images(
        &self,
        item_id: &str,
        images: &[ImageUpload],
    ) -> Result<(), CatalogError> {
        let url = self.product_url(item_id, "/images.json");
        let engine = base64::engine::general_purpose::STANDARD;

        // One request per image; position follows queue order
        for (index, image) in images.iter().enumerate() {
            self.rate_limiter.until_ready().await;

            let body = json!({
                "image": {
                    "attachment": engine.encode(&image.bytes),
                    "filename": image.filename,
                    "position": index + 1,
                }
            });

            tracing::debug!(
                item_id = %item_id,
                filename = %image.filename,
                position = index + 1,
                bytes = image.bytes.len(),
                "Uploading image"
            );

            let response = self
                .client
                .post(&url)
                .header(ACCESS_TOKEN_HEADER, &self.access_token)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;
            Self::check_status(response, Some(item_id)).await?;
        }

        tracing::info!(item_id = %item_id, count = images.len(), "Images attached to catalog item");
        Ok(())
    }

    async fn publish(&self, item_id: &str) -> Result<(), CatalogError> {
        self.rate_limiter.until_ready().await;

        let url = self.product_url(item_id, ".json");
        let body = json!({
            "product": {
                "id": item_id,
                "status": "active",
                "published": true,
            }
        });

        let response = self
            .client
            .put(&url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::check_status(response, Some(item_id)).await?;

        tracing::info!(item_id = %item_id, "Catalog item published");
        Ok(())
    }
}
