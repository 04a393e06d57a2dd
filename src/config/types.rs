use chrono_tz::Tz;
use serde::Deserialize;

/// Main configuration structure for Slotscout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfigs,
    pub sink: SinkConfig,
}

/// Reservation platform location and client identity
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Scheme and host of the platform, e.g. `https://anc.apm.activecommunities.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Organization path segment, e.g. `seattle`
    pub site: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Opaque redirect blob the sign-in form echoes back
    #[serde(rename = "signin-params", default)]
    pub signin_params: String,
}

/// Names of the environment variables holding the account credentials
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(rename = "login-name-env")]
    pub login_name_env: String,

    #[serde(rename = "password-env")]
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            login_name_env: "ANC_LOGIN_NAME".to_string(),
            password_env: "ANC_PASSWORD".to_string(),
        }
    }
}

/// Filter and ordering sent with every listing request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ListingConfig {
    pub facility_type_ids: Vec<u32>,
    pub order_by_field: String,
    pub order_direction: String,
    pub page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            facility_type_ids: vec![39, 115],
            order_by_field: "name".to_string(),
            order_direction: "asc".to_string(),
            page_size: 20,
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of upstream requests in flight, and of items being enriched
    pub max_concurrent_requests: u32,

    /// Minimum time between the starts of two upstream requests (milliseconds)
    pub request_delay_ms: u64,

    /// Civil time zone used for "tomorrow" and for `last_updated`
    pub timezone: Tz,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 8,
            request_delay_ms: 1500,
            timezone: chrono_tz::America::Los_Angeles,
            request_timeout_secs: 30,
        }
    }
}

/// Retry settings for the fetch and persistence layers
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfigs {
    #[serde(default = "RetryConfig::fetch_default")]
    pub fetch: RetryConfig,

    #[serde(default = "RetryConfig::persistence_default")]
    pub persistence: RetryConfig,
}

impl Default for RetryConfigs {
    fn default() -> Self {
        Self {
            fetch: RetryConfig::fetch_default(),
            persistence: RetryConfig::persistence_default(),
        }
    }
}

/// Attempt budget and backoff for one layer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    pub max_attempts: u32,

    /// Delay after the first failed attempt (milliseconds)
    pub delay_ms: u64,

    /// Growth factor applied to the delay after each further failure
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn fetch_default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }

    pub fn persistence_default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2000,
            backoff_multiplier: 1.0,
        }
    }
}

/// Destination table store
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SinkConfig {
    /// A PostgREST endpoint, such as a Supabase project
    Postgrest {
        url: String,
        table: String,
        #[serde(rename = "api-key-env")]
        api_key_env: String,
    },

    /// A local SQLite database
    Sqlite {
        #[serde(rename = "database-path")]
        database_path: String,
        #[serde(default = "default_table")]
        table: String,
    },
}

impl SinkConfig {
    pub fn table(&self) -> &str {
        match self {
            Self::Postgrest { table, .. } | Self::Sqlite { table, .. } => table,
        }
    }
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/129.0.0.0 Safari/537.36"
        .to_string()
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_table() -> String {
    "facility_availability".to_string()
}
