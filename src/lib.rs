//! Catalog-Crawler: an early-stopping crawler for id-addressable video catalogs
//!
//! This crate walks a remote catalog API either by id (deriving a deterministic
//! sequence of lookup keys from a single seed) or by search page, normalizes the
//! returned records into a flat schema, and stops traversal early when the
//! responses themselves say so (rate limiting, publication date out of range,
//! long runs of missing records).

pub mod config;
pub mod crawler;
pub mod ids;
pub mod normalize;
pub mod payload;
pub mod stopping;
pub mod thumbnails;

use thiserror::Error;

/// Main error type for a traversal run
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid video id: {0}")]
    Id(#[from] IdError),

    #[error("Malformed record: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Traversal cancelled")]
    Cancelled,

    #[error("Admission gate closed")]
    GateClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid timestamp in config: {0}")]
    InvalidTimestamp(String),
}

/// Errors raised while parsing or stepping a video id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("video id is empty")]
    Empty,

    #[error("video id must contain only digits, got '{0}'")]
    NotNumeric(String),

    #[error("video id must end with the marker digit '1', got '{0}'")]
    MissingMarker(String),

    #[error("video id '{0}' is out of range")]
    OutOfRange(String),
}

/// Errors raised when a raw payload cannot be shaped into an output record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Transport-level failures reported by a [`crawler::CatalogClient`]
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}")]
    Connect { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid JSON body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),
}

impl TransportError {
    /// Returns true if the failure is transient and the request may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Body { .. } => true,
            Self::Connection(_) => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Http { source, .. } => !source.is_builder(),
        }
    }
}

/// Result type alias for traversal operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CatalogClient, Crawler, FetchMode, Lookup, ReqwestCatalogClient, RunOutcome};
pub use ids::{Direction, VideoId, VideoIdSequence};
pub use normalize::{RawPayload, RecordTransform, Resource, VideoNormalizer, VideoRecord};
pub use stopping::{StopSignal, Stopper, StoppingChain, Verdict};
