//! Thumbnail downloads
//!
//! Thumbnails are fetched concurrently behind their own admission gate and
//! exposed as raw bytes plus the two encodings the catalog tooling uses: a
//! SHA-256 content hash and URL-safe base64.

use crate::crawler::fetcher::classify_error;
use crate::crawler::AdmissionGate;
use crate::{CrawlError, TransportError};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use futures::future::join_all;
use reqwest::Client;
use sha2::{Digest, Sha256};

/// Downloaded thumbnail content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    content: Vec<u8>,
}

impl Thumbnail {
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// SHA-256 of the content as lowercase hex
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.content);
        hex::encode(hasher.finalize())
    }

    /// URL-safe base64 of the content (with padding)
    pub fn base64(&self) -> String {
        URL_SAFE.encode(&self.content)
    }
}

/// Fetches thumbnail contents with bounded concurrency
#[derive(Debug, Clone)]
pub struct ThumbnailDownloader {
    client: Client,
    gate: AdmissionGate,
}

impl ThumbnailDownloader {
    pub fn new(client: Client, max_concurrency: usize) -> Self {
        Self {
            client,
            gate: AdmissionGate::new(max_concurrency),
        }
    }

    /// Downloads every URL; results are returned in input order
    ///
    /// A failed download does not affect the others.
    pub async fn download<S: AsRef<str>>(&self, urls: &[S]) -> Vec<Result<Thumbnail, CrawlError>> {
        let downloads = urls.iter().map(|url| self.download_one(url.as_ref()));
        let results = join_all(downloads).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            "Downloaded {} of {} thumbnails",
            results.len() - failed,
            results.len()
        );
        results
    }

    async fn download_one(&self, url: &str) -> Result<Thumbnail, CrawlError> {
        let _permit = self.gate.admit().await?;

        tracing::debug!("Fetching thumbnail {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Thumbnail {} returned HTTP {}", url, status);
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;
        Ok(Thumbnail::new(content.to_vec()))
    }
}
