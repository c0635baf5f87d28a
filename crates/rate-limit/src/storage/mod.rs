//! Storage backends for bucket evaluation.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use config::StorageConfig;

use crate::key::BucketKey;

mod memory;
mod redis;
mod redis_pool;

pub use memory::InMemoryStorage;
pub use self::redis::RedisStorage;

/// Result of one atomic bucket evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOutcome {
    /// A token was taken, the request may proceed.
    Admitted,
    /// The bucket is empty; it refills after this long.
    RetryAfter(Duration),
    /// Another attempt holds the bucket's lock entry right now.
    LockBusy,
}

/// An atomic evaluate capability over a shared key-value store.
///
/// An implementation must run the whole evaluation (take the lock entry, read the
/// counter, decrement or create it, release the lock entry) as one indivisible step
/// with respect to every other evaluation of the same key.
pub trait BucketStore: Send + Sync {
    /// Evaluate the bucket at `key` for one request.
    fn evaluate(
        &self,
        key: &BucketKey,
        capacity: NonZeroU32,
        window: Duration,
        request_id: &str,
    ) -> impl Future<Output = Result<BucketOutcome, StorageError>> + Send;
}

/// Storage backend selected by configuration.
pub enum Storage {
    /// In-process buckets.
    Memory(InMemoryStorage),
    /// Buckets shared through Redis.
    Redis(RedisStorage),
}

impl Storage {
    /// Build the storage backend described by the configuration.
    ///
    /// For Redis this connects and loads the bucket script, so a failure here means the
    /// store is unusable and startup should stop.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let storage = match config {
            StorageConfig::Memory => Storage::Memory(InMemoryStorage::new()),
            StorageConfig::Redis(redis_config) => Storage::Redis(RedisStorage::new(redis_config).await?),
        };

        Ok(storage)
    }
}

impl BucketStore for Storage {
    async fn evaluate(
        &self,
        key: &BucketKey,
        capacity: NonZeroU32,
        window: Duration,
        request_id: &str,
    ) -> Result<BucketOutcome, StorageError> {
        match self {
            Storage::Memory(storage) => storage.evaluate(key, capacity, window, request_id).await,
            Storage::Redis(storage) => storage.evaluate(key, capacity, window, request_id).await,
        }
    }
}

/// Errors that can occur in storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Could not obtain a connection to the store.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A command failed.
    #[error("Query error: {0}")]
    Query(String),
    /// The bucket script could not be loaded.
    #[error("Script error: {0}")]
    Script(String),
    /// The store replied with something the bucket protocol does not allow.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// The store did not answer in time.
    #[error("Store did not respond within {0:?}")]
    Timeout(Duration),
}
