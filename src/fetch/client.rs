//! HTTP client for the conversations collection endpoint.

use crate::config::ApiConfig;
use crate::fetch::error::FetchError;
use crate::fetch::page::{Page, PageSource};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub desk_id: String,
    pub api_key: String,
    pub account_slug: String,
    pub page_size: u32,
    /// Per-request timeout; `None` keeps reqwest's default (no timeout).
    pub timeout_seconds: Option<u64>,
}

impl From<&ApiConfig> for ClientSettings {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            desk_id: config.desk_id.clone(),
            api_key: config.api_key.clone(),
            account_slug: config.account_slug.clone(),
            page_size: config.page_size,
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// Client for `GET {base_url}/desks/{desk_id}/conversations`.
pub struct ApiClient {
    http: reqwest::Client,
    url: String,
    account_slug: String,
    page_size: u32,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("apikey {}", settings.api_key))
            .map_err(|e| FetchError::Decode(format!("invalid API key header: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = settings.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            url: conversations_url(&settings.base_url, &settings.desk_id),
            account_slug: settings.account_slug.clone(),
            page_size: settings.page_size,
        })
    }

    /// The collection URL requests are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query string pairs for the page at `cursor`.
    pub fn query_params(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("account_slug", self.account_slug.clone()),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("next_cursor", cursor.to_string()));
        }
        params
    }
}

#[async_trait]
impl PageSource for ApiClient {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
        debug!("GET {} (cursor: {:?})", self.url, cursor);

        let response = self
            .http
            .get(&self.url)
            .query(&self.query_params(cursor))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let text = response.text().await?;
        let body: Value =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(Page::from_body(body))
    }
}

/// Join the base URL and desk id into the collection URL.
pub fn conversations_url(base_url: &str, desk_id: &str) -> String {
    format!(
        "{}/desks/{}/conversations",
        base_url.trim_end_matches('/'),
        desk_id
    )
}
