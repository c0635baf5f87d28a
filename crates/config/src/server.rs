//! HTTP server configuration settings.

use std::{borrow::Cow, net::SocketAddr};

use serde::Deserialize;

use crate::{HealthConfig, RateLimitConfig};

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Path of the endpoint guarded by the admission gate.
    pub path: Cow<'static, str>,
    /// Health endpoint configuration.
    pub health: HealthConfig,
    /// Admission control configuration.
    pub rate_limits: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            path: Cow::Borrowed("/rl"),
            health: HealthConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}
