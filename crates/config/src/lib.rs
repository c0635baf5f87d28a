//! leakygate configuration structures to map the leakygate.toml configuration.

#![deny(missing_docs)]

mod health;
mod loader;
mod rate_limit;
mod server;

use std::path::Path;

pub use health::HealthConfig;
pub use rate_limit::*;
use serde::Deserialize;
pub use server::ServerConfig;

/// Main configuration structure for the leakygate application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the admission control settings, returning warnings for legal but suspicious setups.
    pub fn validate(&self) -> anyhow::Result<Vec<String>> {
        loader::validate_rate_limits(self)
    }
}
