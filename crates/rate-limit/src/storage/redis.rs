//! Redis-backed buckets, evaluated by the bucket script.

use std::num::NonZeroU32;
use std::time::Duration;

use config::RedisConfig;
use redis::{ErrorKind, RedisError, aio::MultiplexedConnection};

use super::redis_pool::{self, Pool};
use super::{BucketOutcome, BucketStore, StorageError};
use crate::key::BucketKey;
use crate::script::{BUCKET_SCRIPT, outcome_from_reply};

/// Redis-based bucket storage.
///
/// The bucket script is loaded once when the storage is created and invoked by its
/// SHA1 digest afterwards, so every evaluation runs as a single atomic Redis script.
pub struct RedisStorage {
    /// Redis connection pool.
    pool: Pool,
    /// SHA1 digest of the loaded bucket script.
    script_sha: String,
    /// Upper bound for one evaluation round trip.
    response_timeout: Duration,
}

impl RedisStorage {
    /// Connect to Redis and load the bucket script.
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let pool = redis_pool::create_pool(config)?;

        let connect = async {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| StorageError::Connection(format!("Failed to get Redis connection from pool: {e}")))?;

            load_script(&mut conn).await
        };

        let script_sha = tokio::time::timeout(config.connection_timeout, connect)
            .await
            .map_err(|_| StorageError::Timeout(config.connection_timeout))??;

        log::debug!("Loaded bucket script into Redis at {} as {script_sha}", config.url);

        Ok(Self {
            pool,
            script_sha,
            response_timeout: config.response_timeout,
        })
    }

    /// Tokens left in the bucket's current window, `None` when the bucket does not exist.
    pub async fn tokens_remaining(&self, key: &BucketKey) -> Result<Option<u32>, StorageError> {
        let mut conn = self.connection().await?;

        redis::cmd("GET")
            .arg(key.as_str())
            .query_async(&mut *conn)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    async fn connection(&self) -> Result<deadpool::managed::Object<redis_pool::Manager>, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn run_script(
        &self,
        key: &BucketKey,
        capacity: NonZeroU32,
        window: Duration,
        request_id: &str,
    ) -> Result<BucketOutcome, StorageError> {
        let mut conn = self.connection().await?;

        let reply = match invoke_script(&mut conn, &self.script_sha, key, capacity, window, request_id).await {
            Err(e) if e.kind() == ErrorKind::NoScriptError => {
                // The script cache was flushed, typically by a Redis restart.
                log::warn!("Bucket script missing from Redis, loading it again");
                load_script(&mut conn).await?;

                invoke_script(&mut conn, &self.script_sha, key, capacity, window, request_id).await
            }
            reply => reply,
        };

        let reply = reply.map_err(|e| StorageError::Query(e.to_string()))?;

        outcome_from_reply(reply)
    }
}

impl BucketStore for RedisStorage {
    async fn evaluate(
        &self,
        key: &BucketKey,
        capacity: NonZeroU32,
        window: Duration,
        request_id: &str,
    ) -> Result<BucketOutcome, StorageError> {
        tokio::time::timeout(self.response_timeout, self.run_script(key, capacity, window, request_id))
            .await
            .map_err(|_| StorageError::Timeout(self.response_timeout))?
    }
}

async fn load_script(conn: &mut MultiplexedConnection) -> Result<String, StorageError> {
    redis::cmd("SCRIPT")
        .arg("LOAD")
        .arg(BUCKET_SCRIPT)
        .query_async(conn)
        .await
        .map_err(|e| StorageError::Script(format!("Failed to load bucket script: {e}")))
}

async fn invoke_script(
    conn: &mut MultiplexedConnection,
    sha: &str,
    key: &BucketKey,
    capacity: NonZeroU32,
    window: Duration,
    request_id: &str,
) -> Result<Option<i64>, RedisError> {
    redis::cmd("EVALSHA")
        .arg(sha)
        .arg(1)
        .arg(key.as_str())
        .arg(capacity.get())
        .arg(window.as_secs())
        .arg(request_id)
        .query_async(conn)
        .await
}
