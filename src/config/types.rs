use serde::Deserialize;

/// Main configuration structure for Catalog-Crawler
///
/// Every section is optional; missing sections and keys take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub client: ClientConfig,
    pub fetch: FetchConfig,
    pub stopping: StoppingConfig,
}

/// Remote catalog endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the catalog API (all requests are GETs on this URL)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Thumbnail size requested from the API (small, medium or big)
    pub thumbsize: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.xyz.com".to_string(),
            thumbsize: "big".to_string(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("catalog-crawler/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Fetch engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of requests open at once in concurrent mode
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// First retry delay after a transport failure (milliseconds)
    #[serde(rename = "retry-min-delay-ms")]
    pub retry_min_delay_ms: u64,

    /// Cap on the retry delay (milliseconds)
    #[serde(rename = "retry-max-delay-ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 50,
            retry_min_delay_ms: 2_000,
            retry_max_delay_ms: 10_000,
        }
    }
}

/// Early-stopping configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoppingConfig {
    /// Consecutive failed lookups tolerated before stopping
    #[serde(rename = "failure-patience")]
    pub failure_patience: u32,

    /// Minimum publication datetime (inclusive)
    pub since: Option<String>,

    /// Maximum publication datetime (exclusive)
    pub until: Option<String>,
}

impl Default for StoppingConfig {
    fn default() -> Self {
        Self {
            failure_patience: 500,
            since: None,
            until: None,
        }
    }
}
