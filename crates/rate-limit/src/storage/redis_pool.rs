//! Pool of multiplexed Redis connections used to run the bucket script.

use std::path::Path;

use config::{RedisConfig, RedisTlsConfig};
use deadpool::managed::{self, Metrics, PoolConfig, RecycleError, RecycleResult, Timeouts};
use redis::{Client, ClientTlsConfig, RedisError, TlsCertificates, aio::MultiplexedConnection};

use super::StorageError;

pub(super) type Pool = managed::Pool<Manager>;

/// Opens multiplexed connections and checks them with a `PING` before reuse.
pub(super) struct Manager {
    client: Client,
}

impl managed::Manager for Manager {
    type Type = MultiplexedConnection;
    type Error = RedisError;

    async fn create(&self) -> Result<MultiplexedConnection, RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn recycle(&self, conn: &mut MultiplexedConnection, _: &Metrics) -> RecycleResult<RedisError> {
        let pong: String = redis::cmd("PING").query_async(conn).await?;

        if pong != "PONG" {
            return Err(RecycleError::message(format!("Unexpected PING reply: {pong}")));
        }

        Ok(())
    }
}

pub(super) fn create_pool(config: &RedisConfig) -> Result<Pool, StorageError> {
    let client = match &config.tls {
        Some(tls) => Client::build_with_tls(config.url.as_str(), tls_certificates(tls)?),
        None => Client::open(config.url.as_str()),
    }
    .map_err(|e| StorageError::Connection(format!("Invalid Redis URL {}: {e}", config.url)))?;

    let pool_config = PoolConfig {
        max_size: config.max_connections,
        timeouts: Timeouts {
            wait: Some(config.acquire_timeout),
            create: Some(config.connection_timeout),
            recycle: Some(config.response_timeout),
        },
        ..PoolConfig::default()
    };

    Pool::builder(Manager { client })
        .config(pool_config)
        .runtime(deadpool::Runtime::Tokio1)
        .build()
        .map_err(|e| StorageError::Connection(format!("Failed to build Redis connection pool: {e}")))
}

fn tls_certificates(tls: &RedisTlsConfig) -> Result<TlsCertificates, StorageError> {
    let client_tls = match (&tls.client_cert, &tls.client_key) {
        (Some(cert), Some(key)) => Some(ClientTlsConfig {
            client_cert: read_pem(cert)?,
            client_key: read_pem(key)?,
        }),
        _ => None,
    };

    let root_cert = tls.ca_cert.as_deref().map(read_pem).transpose()?;

    Ok(TlsCertificates { client_tls, root_cert })
}

fn read_pem(path: &Path) -> Result<Vec<u8>, StorageError> {
    std::fs::read(path).map_err(|e| StorageError::Connection(format!("Failed to read {}: {e}", path.display())))
}
