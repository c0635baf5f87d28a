use std::{path::Path, time::Duration};

use anyhow::bail;
use indoc::indoc;

use crate::{Config, IdentitySource, RedisConfig, StorageConfig};

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&content)?;

    let warnings = validate_rate_limits(&config)?;

    for warning in warnings {
        log::warn!("{warning}");
    }

    Ok(config)
}

/// Validates the admission control configuration and returns warnings.
pub(crate) fn validate_rate_limits(config: &Config) -> anyhow::Result<Vec<String>> {
    let rate_limits = &config.server.rate_limits;

    if !rate_limits.enabled {
        return Ok(Vec::new());
    }

    if rate_limits.limit == 0 {
        bail!(indoc! {r#"
            Rate limit `limit` must be greater than 0. Every window needs at least one token, for example:

              [server.rate_limits]
              enabled = true
              limit = 10
              duration = "1s"
        "#});
    }

    if rate_limits.duration < Duration::from_secs(1) {
        bail!(
            "Rate limit `duration` must be at least one second, got {:?}",
            rate_limits.duration
        );
    }

    if rate_limits.dimension.trim().is_empty() {
        bail!("Rate limit `dimension` must not be empty");
    }

    if let IdentitySource::HttpHeader(header) = &rate_limits.source
        && header.trim().is_empty()
    {
        bail!("Rate limit `source.http_header` must name a header");
    }

    if let StorageConfig::Redis(redis) = &rate_limits.storage {
        validate_redis(redis)?;
    }

    let mut warnings = Vec::new();

    if rate_limits.duration.subsec_nanos() != 0 {
        warnings.push(format!(
            "Rate limit `duration` of {:?} is truncated to {}s, the store only keeps whole seconds",
            rate_limits.duration,
            rate_limits.duration.as_secs()
        ));
    }

    if matches!(rate_limits.storage, StorageConfig::Memory) {
        warnings.push(
            "Rate limits use in-memory storage, buckets are not shared with other leakygate processes".to_string(),
        );
    }

    Ok(warnings)
}

fn validate_redis(redis: &RedisConfig) -> anyhow::Result<()> {
    if redis.max_connections == 0 {
        bail!("Redis `max_connections` must be greater than 0");
    }

    if let Some(tls) = &redis.tls
        && tls.client_cert.is_some() != tls.client_key.is_some()
    {
        bail!("Redis TLS `client_cert` and `client_key` must be set together");
    }

    Ok(())
}
