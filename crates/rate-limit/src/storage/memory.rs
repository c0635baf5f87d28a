//! In-memory bucket storage.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::{BucketOutcome, BucketStore, StorageError};
use crate::key::BucketKey;
use crate::script::LOCK_TTL;

/// Evaluations between two sweeps of expired buckets.
const SWEEP_INTERVAL: u64 = 1024;

/// A value that disappears once its deadline passes, like a key with a TTL.
#[derive(Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            expires_at: now + ttl,
        }
    }
}

/// The counter and lock entry of one bucket.
#[derive(Debug, Default)]
struct Bucket {
    tokens: Option<Expiring<u32>>,
    lock: Option<Expiring<String>>,
}

impl Bucket {
    fn expire(&mut self, now: Instant) {
        if self.tokens.as_ref().is_some_and(|tokens| tokens.expires_at <= now) {
            self.tokens = None;
        }

        if self.lock.as_ref().is_some_and(|lock| lock.expires_at <= now) {
            self.lock = None;
        }
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_none() && self.lock.is_none()
    }
}

/// In-memory bucket storage with the same atomic evaluation as the bucket script.
///
/// Each bucket is mutated while its map entry is locked, so evaluations of the same
/// key never interleave. Buckets are private to this process.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    buckets: DashMap<String, Bucket>,
    evaluations: AtomicU64,
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens left in the bucket's current window, `None` when the bucket does not exist.
    pub fn tokens_remaining(&self, key: &BucketKey) -> Option<u32> {
        let now = Instant::now();

        self.buckets
            .get(key.as_str())?
            .tokens
            .as_ref()
            .filter(|tokens| tokens.expires_at > now)
            .map(|tokens| tokens.value)
    }

    fn sweep(&self, now: Instant) {
        let evaluations = self.evaluations.fetch_add(1, Ordering::Relaxed) + 1;

        if evaluations % SWEEP_INTERVAL != 0 {
            return;
        }

        let before = self.buckets.len();

        self.buckets.retain(|_, bucket| {
            bucket.expire(now);
            !bucket.is_empty()
        });

        log::debug!("Swept {} expired buckets", before.saturating_sub(self.buckets.len()));
    }

    #[cfg(test)]
    fn hold_lock(&self, key: &BucketKey, holder: &str) {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.as_str().to_string()).or_default();

        bucket.lock = Some(Expiring::new(holder.to_string(), LOCK_TTL, now));
    }
}

impl BucketStore for InMemoryStorage {
    async fn evaluate(
        &self,
        key: &BucketKey,
        capacity: NonZeroU32,
        window: Duration,
        request_id: &str,
    ) -> Result<BucketOutcome, StorageError> {
        let now = Instant::now();

        // Never sweep while holding an entry, retain locks every shard.
        self.sweep(now);

        let mut bucket = self.buckets.entry(key.as_str().to_string()).or_default();
        bucket.expire(now);

        if bucket.lock.is_some() {
            return Ok(BucketOutcome::LockBusy);
        }

        bucket.lock = Some(Expiring::new(request_id.to_string(), LOCK_TTL, now));

        let outcome = match bucket.tokens.as_mut() {
            Some(tokens) if tokens.value > 0 => {
                tokens.value -= 1;
                BucketOutcome::Admitted
            }
            Some(tokens) => {
                let millis = tokens.expires_at.duration_since(now).as_millis().max(1);
                BucketOutcome::RetryAfter(Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX)))
            }
            None => {
                let window = Duration::from_secs(window.as_secs());
                bucket.tokens = Some(Expiring::new(capacity.get() - 1, window, now));
                BucketOutcome::Admitted
            }
        };

        if bucket.lock.as_ref().is_some_and(|lock| lock.value == request_id) {
            bucket.lock = None;
        }

        log::debug!("Evaluated bucket '{key}': {outcome:?}");

        Ok(outcome)
    }
}
