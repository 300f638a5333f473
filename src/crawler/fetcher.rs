//! Catalog transport
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Typed request parameters for search pages and id lookups
//! - The [`CatalogClient`] seam the crawler is generic over
//! - Error classification into retryable and fatal transport failures

use crate::config::{ApiConfig, ClientConfig};
use crate::ids::VideoId;
use crate::normalize::Resource;
use crate::{CrawlError, TransportError};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Optional search filters sent with every search page request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text query
    pub query: Option<String>,
    /// Sort order understood by the catalog (e.g. `latest`, `top-rated`)
    pub order: Option<String>,
    /// Number of results per page
    pub per_page: Option<u32>,
}

/// What a single request asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// One page of search results (pages start at 1)
    SearchPage { page: u32, query: SearchQuery },
    /// Direct lookup of one video
    Video(VideoId),
}

/// Query parameters of one catalog request
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    thumbsize: String,
    target: RequestTarget,
}

impl RequestParams {
    /// Parameters for one page of search results
    pub fn search_page(thumbsize: &str, page: u32, query: SearchQuery) -> Self {
        Self {
            thumbsize: thumbsize.to_string(),
            target: RequestTarget::SearchPage { page, query },
        }
    }

    /// Parameters for a lookup by id
    pub fn video(thumbsize: &str, video_id: VideoId) -> Self {
        Self {
            thumbsize: thumbsize.to_string(),
            target: RequestTarget::Video(video_id),
        }
    }

    pub fn target(&self) -> &RequestTarget {
        &self.target
    }

    pub fn thumbsize(&self) -> &str {
        &self.thumbsize
    }

    /// The remote operation this request selects
    pub fn resource(&self) -> Resource {
        match self.target {
            RequestTarget::SearchPage { .. } => Resource::Search,
            RequestTarget::Video(_) => Resource::VideoById,
        }
    }

    /// Query string pairs, in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("output", "json".to_string()),
            ("thumbsize", self.thumbsize.clone()),
            ("data", self.resource().as_str().to_string()),
        ];

        match &self.target {
            RequestTarget::SearchPage { page, query } => {
                pairs.push(("page", page.to_string()));
                if let Some(q) = &query.query {
                    pairs.push(("query", q.clone()));
                }
                if let Some(order) = &query.order {
                    pairs.push(("order", order.clone()));
                }
                if let Some(per_page) = query.per_page {
                    pairs.push(("per_page", per_page.to_string()));
                }
            }
            RequestTarget::Video(id) => pairs.push(("video_id", id.to_string())),
        }

        pairs
    }
}

impl std::fmt::Display for RequestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            RequestTarget::SearchPage { page, .. } => write!(f, "search page {}", page),
            RequestTarget::Video(id) => write!(f, "video {}", id),
        }
    }
}

/// A client able to issue catalog requests and decode their JSON body
pub trait CatalogClient: Send + Sync {
    fn get(
        &self,
        params: &RequestParams,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

impl<C: CatalogClient> CatalogClient for Arc<C> {
    fn get(
        &self,
        params: &RequestParams,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        (**self).get(params)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP client configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`CatalogClient`] backed by `reqwest`
///
/// Every request is a GET on the configured base URL; the operation is
/// selected purely through query parameters.
#[derive(Debug, Clone)]
pub struct ReqwestCatalogClient {
    client: Client,
    base_url: Url,
}

impl ReqwestCatalogClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Builds a client from the `[api]` and `[client]` configuration sections
    pub fn from_config(api: &ApiConfig, client: &ClientConfig) -> Result<Self, CrawlError> {
        let base_url = Url::parse(&api.base_url).map_err(|e| {
            crate::ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", api.base_url, e))
        })?;
        let client = build_http_client(client).map_err(CrawlError::ClientBuild)?;
        Ok(Self::new(client, base_url))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client, shared with thumbnail downloads
    pub fn http(&self) -> &Client {
        &self.client
    }
}

impl CatalogClient for ReqwestCatalogClient {
    async fn get(&self, params: &RequestParams) -> Result<Value, TransportError> {
        let url = self.base_url.as_str();
        tracing::trace!("GET {} ({})", url, params);

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&params.query_pairs())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;

        // The catalog reports record-level failures inside the JSON body, so a
        // decodable body wins over the HTTP status
        match serde_json::from_slice::<Value>(&body) {
            Ok(payload) => Ok(payload),
            Err(_) if !status.is_success() => Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            Err(e) => Err(TransportError::Body {
                url: url.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Maps a reqwest error onto the transport error taxonomy
pub(crate) fn classify_error(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
        }
    } else {
        TransportError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
