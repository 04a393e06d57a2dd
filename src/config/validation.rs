use crate::config::types::{
    Config, CrawlerConfig, ListingConfig, PlatformConfig, RetryConfig, SinkConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_platform_config(&config.platform)?;
    validate_listing_config(&config.listing)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_config("retry.fetch", &config.retry.fetch)?;
    validate_retry_config("retry.persistence", &config.retry.persistence)?;
    validate_persistence_delay(&config.retry.persistence)?;
    validate_sink_config(&config.sink)?;
    Ok(())
}

/// Returns true if `name` is safe to splice into a URL path or SQL statement
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates platform configuration
fn validate_platform_config(config: &PlatformConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    // Site is a single path segment
    if config.site.is_empty() || config.site.contains('/') {
        return Err(ConfigError::Validation(format!(
            "site must be a non-empty path segment, got '{}'",
            config.site
        )));
    }

    if config.locale.is_empty() {
        return Err(ConfigError::Validation("locale cannot be empty".to_string()));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates listing configuration
fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > 500 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 500, got {}",
            config.page_size
        )));
    }

    if config.facility_type_ids.is_empty() {
        return Err(ConfigError::Validation(
            "facility-type-ids must name at least one facility type".to_string(),
        ));
    }

    if config.order_by_field.is_empty() {
        return Err(ConfigError::Validation(
            "order-by-field cannot be empty".to_string(),
        ));
    }

    if config.order_direction != "asc" && config.order_direction != "desc" {
        return Err(ConfigError::Validation(format!(
            "order-direction must be 'asc' or 'desc', got '{}'",
            config.order_direction
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 64, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.request_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "request-delay-ms must be <= 60000ms, got {}ms",
            config.request_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates one retry layer
fn validate_retry_config(layer: &str, config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "{}.max-attempts must be between 1 and 10, got {}",
            layer, config.max_attempts
        )));
    }

    if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "{}.backoff-multiplier must be >= 1.0, got {}",
            layer, config.backoff_multiplier
        )));
    }

    Ok(())
}

/// Sink writes wait the same delay between every attempt
fn validate_persistence_delay(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.backoff_multiplier != 1.0 {
        return Err(ConfigError::Validation(format!(
            "retry.persistence.backoff-multiplier must be 1.0 (fixed delay), got {}",
            config.backoff_multiplier
        )));
    }

    Ok(())
}

/// Validates sink configuration
fn validate_sink_config(config: &SinkConfig) -> Result<(), ConfigError> {
    if !is_valid_table_name(config.table()) {
        return Err(ConfigError::Validation(format!(
            "table name '{}' must contain only ASCII letters, digits and underscores",
            config.table()
        )));
    }

    match config {
        SinkConfig::Postgrest {
            url, api_key_env, ..
        } => {
            Url::parse(url)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid sink url: {}", e)))?;

            if api_key_env.is_empty() {
                return Err(ConfigError::Validation(
                    "api-key-env cannot be empty".to_string(),
                ));
            }
        }
        SinkConfig::Sqlite { database_path, .. } => {
            if database_path.is_empty() {
                return Err(ConfigError::Validation(
                    "database-path cannot be empty".to_string(),
                ));
            }
        }
    }

    Ok(())
}
