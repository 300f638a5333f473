use crate::config::types::{ApiConfig, ClientConfig, Config, FetchConfig, StoppingConfig};
use crate::normalize::parse_timestamp;
use crate::ConfigError;
use chrono::{DateTime, Utc};
use url::Url;

/// Thumbnail sizes understood by the catalog API
pub const THUMB_SIZES: [&str; 3] = ["small", "medium", "big"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_client_config(&config.client)?;
    validate_fetch_config(&config.fetch)?;
    validate_stopping_config(&config.stopping)?;
    Ok(())
}

/// Validates the catalog endpoint configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if !THUMB_SIZES.contains(&config.thumbsize.as_str()) {
        return Err(ConfigError::Validation(format!(
            "thumbsize must be one of {:?}, got '{}'",
            THUMB_SIZES, config.thumbsize
        )));
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch engine configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 1000 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 1000, got {}",
            config.max_concurrency
        )));
    }

    if config.retry_min_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "retry-min-delay-ms must be >= 1".to_string(),
        ));
    }

    if config.retry_max_delay_ms < config.retry_min_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry-max-delay-ms ({}) must be >= retry-min-delay-ms ({})",
            config.retry_max_delay_ms, config.retry_min_delay_ms
        )));
    }

    Ok(())
}

/// Validates early-stopping configuration
fn validate_stopping_config(config: &StoppingConfig) -> Result<(), ConfigError> {
    if config.failure_patience < 1 {
        return Err(ConfigError::Validation(format!(
            "failure-patience must be >= 1, got {}",
            config.failure_patience
        )));
    }

    let (since, until) = publication_bounds(config)?;
    if let (Some(since), Some(until)) = (since, until) {
        if since >= until {
            return Err(ConfigError::Validation(format!(
                "since ({}) must be earlier than until ({})",
                since, until
            )));
        }
    }

    Ok(())
}

/// Parses the optional `since`/`until` publication bounds
pub fn publication_bounds(
    config: &StoppingConfig,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ConfigError> {
    let parse = |raw: &Option<String>| -> Result<Option<DateTime<Utc>>, ConfigError> {
        raw.as_deref()
            .map(|s| parse_timestamp(s).map_err(|e| ConfigError::InvalidTimestamp(e.to_string())))
            .transpose()
    };
    Ok((parse(&config.since)?, parse(&config.until)?))
}
