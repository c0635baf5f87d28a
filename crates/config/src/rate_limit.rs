//! Admission control configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Admission control configuration for the protected endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether admission control is enabled.
    pub enabled: bool,
    /// Logical dimension name, part of every bucket key (e.g. `ip`).
    pub dimension: String,
    /// Where the caller identity for the dimension comes from.
    pub source: IdentitySource,
    /// Namespace prefix of every bucket key.
    pub namespace: String,
    /// Bucket capacity: tokens handed out per window.
    pub limit: u32,
    /// Window length. Only whole seconds are honored by the store.
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    /// Storage backend configuration.
    pub storage: StorageConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dimension: "ip".to_string(),
            source: IdentitySource::default(),
            namespace: "RL:".to_string(),
            limit: 10,
            duration: Duration::from_secs(1),
            storage: StorageConfig::default(),
        }
    }
}

/// Source of the caller identity used to pick a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// The client address: `X-Real-IP`, then `X-Forwarded-For`, then the peer address.
    #[default]
    ClientAddress,
    /// The value of an HTTP request header.
    HttpHeader(String),
}

/// Where buckets live.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Buckets private to this process.
    #[default]
    Memory,
    /// Buckets shared by every process pointing at the same Redis server.
    Redis(Box<RedisConfig>),
}

/// Redis bucket store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisConfig {
    /// Connection URL, `redis://` or `rediss://`.
    pub url: String,
    /// Upper bound of pooled connections.
    pub max_connections: usize,
    /// How long a request may wait for a free pooled connection.
    #[serde(deserialize_with = "deserialize_duration")]
    pub acquire_timeout: Duration,
    /// Upper bound of one bucket evaluation round trip.
    #[serde(deserialize_with = "deserialize_duration")]
    pub response_timeout: Duration,
    /// Upper bound for opening a connection, including the script load at startup.
    #[serde(deserialize_with = "deserialize_duration")]
    pub connection_timeout: Duration,
    /// Certificates for TLS connections. The section being present turns TLS on.
    pub tls: Option<RedisTlsConfig>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            max_connections: 16,
            acquire_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(5),
            tls: None,
        }
    }
}

/// PEM files used for Redis TLS. Without a CA the system roots are trusted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisTlsConfig {
    /// CA certificate to trust instead of the system roots.
    pub ca_cert: Option<PathBuf>,
    /// Client certificate for mutual TLS, requires `client_key`.
    pub client_cert: Option<PathBuf>,
    /// Client private key for mutual TLS, requires `client_cert`.
    pub client_key: Option<PathBuf>,
}
