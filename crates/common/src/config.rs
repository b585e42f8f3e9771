//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Federation protocol configuration.
    pub federation: FederationConfig,
    /// Background worker configuration.
    #[serde(default)]
    pub workers: WorkerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance, e.g. `https://a.example`.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Federation protocol configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Instance name.
    pub instance_name: String,
    /// Protocol versions this instance speaks.
    #[serde(default = "default_protocol_versions")]
    pub protocol_versions: Vec<String>,
    /// Activity types this instance accepts.
    #[serde(default = "default_supported_activity_types")]
    pub supported_activity_types: Vec<String>,
    /// Largest inbox envelope accepted, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size_bytes: i64,
    /// Rate limit advertised to remote servers.
    #[serde(default)]
    pub advertised_rate_limit: AdvertisedRateLimit,
    /// Whole-request timeout for outbound federation calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Connect timeout for outbound federation calls.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// User agent for outbound calls. Defaults to `fedinet/<version> (+<url>)`.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Path to a PKCS#8 PEM private key used to sign outbound envelopes.
    #[serde(default)]
    pub signing_key_path: Option<String>,
}

/// Rate limit advertised in the capability document.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvertisedRateLimit {
    /// Requests per minute.
    pub requests_per_min: i32,
    /// Burst allowance on top of the per-minute budget.
    pub burst: i32,
}

impl Default for AdvertisedRateLimit {
    fn default() -> Self {
        Self {
            requests_per_min: 100,
            burst: 20,
        }
    }
}

/// Background worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Interval between retry sweeps.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
    /// Maximum retries, and never-attempted activities, picked per sweep.
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: u64,
    /// Interval between stale-activity expiration sweeps.
    #[serde(default = "default_expiration_interval")]
    pub expiration_interval_secs: u64,
    /// Age after which a pending activity is force-expired.
    #[serde(default = "default_expiration_age")]
    pub expiration_age_secs: i64,
    /// Interval between health snapshot recomputations.
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
    /// Bounded task queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Concurrent task workers.
    #[serde(default = "default_queue_workers")]
    pub queue_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            retry_interval_secs: default_retry_interval(),
            retry_batch_size: default_retry_batch_size(),
            expiration_interval_secs: default_expiration_interval(),
            expiration_age_secs: default_expiration_age(),
            health_interval_secs: default_health_interval(),
            queue_capacity: default_queue_capacity(),
            queue_workers: default_queue_workers(),
        }
    }
}

impl WorkerConfig {
    /// Retry sweep interval.
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    /// Expiration sweep interval.
    #[must_use]
    pub const fn expiration_interval(&self) -> Duration {
        Duration::from_secs(self.expiration_interval_secs)
    }

    /// Health recompute interval.
    #[must_use]
    pub const fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8081
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_protocol_versions() -> Vec<String> {
    vec!["1.0.0".to_string()]
}

fn default_supported_activity_types() -> Vec<String> {
    ["Follow", "Like", "Post", "Message", "Update", "Block", "RevokeKey"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_max_message_size() -> i64 {
    1_048_576
}

const fn default_request_timeout() -> u64 {
    10
}

const fn default_connect_timeout() -> u64 {
    5
}

const fn default_retry_interval() -> u64 {
    30
}

const fn default_retry_batch_size() -> u64 {
    100
}

const fn default_expiration_interval() -> u64 {
    300
}

const fn default_expiration_age() -> i64 {
    86_400
}

const fn default_health_interval() -> u64 {
    60
}

const fn default_queue_capacity() -> usize {
    1024
}

const fn default_queue_workers() -> usize {
    8
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `FEDINET_ENV`)
    /// 3. Environment variables with `FEDINET__` prefix, e.g. `FEDINET__DATABASE__URL`
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("FEDINET_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FEDINET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FEDINET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// The public URL of this instance without a trailing slash.
    #[must_use]
    pub fn instance_url(&self) -> &str {
        self.server.url.trim_end_matches('/')
    }
}
