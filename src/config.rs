//! Configuration types for fanout-relay

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

/// Main configuration
///
/// Fields are organized into sub-configs:
/// - [`upstream`](UpstreamConfig): where items are fetched from and how long a fetch may take
/// - [`streaming`](StreamingConfig): the `/stream` adapter (SSE)
/// - [`batch`](BatchConfig): the `/batch` adapter (single buffered response)
/// - [`server`](ServerIntegrationConfig): HTTP listener settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream item source
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Streaming adapter settings
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Batch adapter settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// API and server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Parse a JSON document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check the invariants the fan-out engine relies on
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.upstream.base_url).map_err(|e| {
            Error::config(
                "upstream.base_url",
                format!("invalid base URL '{}': {}", self.upstream.base_url, e),
            )
        })?;

        if self.upstream.timeout.is_zero() {
            return Err(Error::config(
                "upstream.timeout",
                "per-fetch timeout must be greater than zero",
            ));
        }

        if self.streaming.num_workers == 0 {
            return Err(Error::config(
                "streaming.num_workers",
                "at least one worker is required",
            ));
        }

        if self.streaming.heartbeat_interval.is_zero() {
            return Err(Error::config(
                "streaming.heartbeat_interval",
                "heartbeat interval must be greater than zero",
            ));
        }

        // Emitting in arrival order is only equivalent to submission order when
        // fetches are serialized on a single worker.
        if self.streaming.emit_policy == EmitPolicy::AsArrived && self.streaming.num_workers > 1 {
            return Err(Error::config(
                "streaming.emit_policy",
                format!(
                    "as_arrived emission requires exactly one worker, got {}",
                    self.streaming.num_workers
                ),
            ));
        }

        if self.batch.num_workers == 0 {
            return Err(Error::config(
                "batch.num_workers",
                "at least one worker is required",
            ));
        }

        Ok(())
    }
}

/// Upstream item source configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL; item `i` is fetched from `<base_url><i>`
    /// (default: "http://localhost:8080/api/item/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-fetch timeout in seconds (default: 30)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent sent with every upstream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Streaming (`/stream`) adapter configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Number of concurrent fetch workers (default: 4)
    #[serde(default = "default_stream_workers")]
    pub num_workers: usize,

    /// Number of items fetched per request (default: 20)
    #[serde(default = "default_num_requests")]
    pub num_requests: usize,

    /// Interval between heartbeat frames in seconds (default: 10)
    #[serde(default = "default_heartbeat_interval", with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Order in which results are written to the client (default: ordered)
    #[serde(default)]
    pub emit_policy: EmitPolicy,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            num_workers: default_stream_workers(),
            num_requests: default_num_requests(),
            heartbeat_interval: default_heartbeat_interval(),
            emit_policy: EmitPolicy::default(),
        }
    }
}

/// Batch (`/batch`) adapter configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of concurrent fetch workers (default: 1)
    #[serde(default = "default_batch_workers")]
    pub num_workers: usize,

    /// Number of items fetched per request (default: 20)
    #[serde(default = "default_num_requests")]
    pub num_requests: usize,

    /// Body format (default: json)
    #[serde(default)]
    pub format: BatchFormat,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_workers: default_batch_workers(),
            num_requests: default_num_requests(),
            format: BatchFormat::default(),
        }
    }
}

/// Streaming emission policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitPolicy {
    /// Hold early arrivals until every lower index has been written (default)
    #[default]
    Ordered,
    /// Write results as workers publish them; only valid with one worker
    AsArrived,
}

/// Batch response body format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFormat {
    /// JSON array of strings (default)
    #[default]
    Json,
    /// Historical `["[a b c]"]` rendering, kept for existing clients
    Legacy,
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Built-in demo upstream served at `/api/item/:id`
    #[serde(default)]
    pub demo_upstream: DemoUpstreamConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            demo_upstream: DemoUpstreamConfig::default(),
        }
    }
}

/// Demo upstream route configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemoUpstreamConfig {
    /// Mount `/api/item/:id` on the router (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Artificial latency per item in milliseconds (default: 2000)
    #[serde(default = "default_demo_delay", with = "duration_ms_serde")]
    pub delay: Duration,
}

impl Default for DemoUpstreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: default_demo_delay(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api/item/".to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("fanout-relay/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_stream_workers() -> usize {
    4
}

fn default_batch_workers() -> usize {
    1
}

fn default_num_requests() -> usize {
    20
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_demo_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond Duration serialization helper
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();

        assert_eq!(config.upstream.timeout, Duration::from_secs(30));
        assert_eq!(config.streaming.num_workers, 4);
        assert_eq!(config.streaming.num_requests, 20);
        assert_eq!(config.streaming.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.streaming.emit_policy, EmitPolicy::Ordered);
        assert_eq!(config.batch.num_workers, 1);
        assert_eq!(config.batch.num_requests, 20);
        assert_eq!(config.batch.format, BatchFormat::Json);
        assert!(!config.server.api.demo_upstream.enabled);
        config.validate().expect("default config must be valid");
    }

    #[test]
    fn empty_json_object_yields_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.upstream.base_url, "http://localhost:8080/api/item/");
        assert_eq!(config.server.api.bind_address.port(), 8080);
    }

    #[test]
    fn config_default_survives_json_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(back.upstream.base_url, config.upstream.base_url);
        assert_eq!(back.upstream.timeout, config.upstream.timeout);
        assert_eq!(back.streaming.heartbeat_interval, config.streaming.heartbeat_interval);
        assert_eq!(back.server.api.demo_upstream.delay, config.server.api.demo_upstream.delay);
    }

    #[test]
    fn durations_use_seconds_and_demo_delay_uses_millis() {
        let json = r#"{
            "upstream": { "timeout": 5 },
            "streaming": { "heartbeat_interval": 2, "emit_policy": "ordered" },
            "server": { "api": { "demo_upstream": { "enabled": true, "delay": 150 } } }
        }"#;
        let config = Config::from_json_str(json).unwrap();

        assert_eq!(config.upstream.timeout, Duration::from_secs(5));
        assert_eq!(config.streaming.heartbeat_interval, Duration::from_secs(2));
        assert!(config.server.api.demo_upstream.enabled);
        assert_eq!(config.server.api.demo_upstream.delay, Duration::from_millis(150));
    }

    #[test]
    fn duration_serde_rejects_string_instead_of_integer() {
        let json = r#"{ "upstream": { "timeout": "thirty" } }"#;
        let err = Config::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)), "got {err:?}");
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.streaming.num_workers = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("streaming.num_workers"))
            }
            other => panic!("expected config error, got {other:?}"),
        }

        let mut config = Config::default();
        config.batch.num_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn as_arrived_requires_single_worker() {
        let mut config = Config::default();
        config.streaming.emit_policy = EmitPolicy::AsArrived;
        config.streaming.num_workers = 4;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("streaming.emit_policy"))
            }
            other => panic!("expected config error, got {other:?}"),
        }

        config.streaming.num_workers = 1;
        config.validate().expect("single worker may emit as arrived");
    }

    #[test]
    fn zero_requests_is_allowed() {
        let mut config = Config::default();
        config.streaming.num_requests = 0;
        config.batch.num_requests = 0;
        config.validate().unwrap();
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut config = Config::default();
        config.upstream.base_url = "not a url".to_string();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("upstream.base_url")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_durations_are_rejected() {
        let mut config = Config::default();
        config.upstream.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.streaming.heartbeat_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
