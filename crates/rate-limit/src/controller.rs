//! Per-request admission state machine.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::deadline::Deadline;
use crate::error::{AdmissionError, ConfigurationError};
use crate::key::BucketKey;
use crate::storage::{BucketOutcome, BucketStore, Storage};

/// Overall time one request may spend waiting for admission.
pub const ADMISSION_DEADLINE: Duration = Duration::from_secs(3);

/// Number of bucket evaluations one request may make.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff after finding the bucket's lock entry held by another attempt.
pub const LOCK_BACKOFF: Duration = Duration::from_millis(100);

const DEFAULT_NAMESPACE: &str = "RL:";

/// Decides, per caller identity, whether a request is admitted.
///
/// The controller keeps no per-request state between calls. All coordination between
/// requests, in this process or any other, happens through the store's atomic
/// bucket evaluation.
pub struct AdmissionController<S = Storage> {
    store: Arc<S>,
    namespace: String,
    dimension: String,
    capacity: NonZeroU32,
    window: Duration,
}

impl<S> AdmissionController<S>
where
    S: BucketStore,
{
    /// Create a controller handing out `capacity` tokens per `window` for each identity of `dimension`.
    ///
    /// Fails when the capacity is zero, the window is under one second or the dimension is empty.
    pub fn new(
        store: Arc<S>,
        dimension: impl Into<String>,
        capacity: u32,
        window: Duration,
    ) -> Result<Self, ConfigurationError> {
        let dimension = dimension.into();

        if dimension.trim().is_empty() {
            return Err(ConfigurationError::EmptyDimension);
        }

        let capacity = NonZeroU32::new(capacity).ok_or(ConfigurationError::ZeroCapacity)?;

        if window < Duration::from_secs(1) {
            return Err(ConfigurationError::WindowTooShort(window));
        }

        Ok(Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            dimension,
            capacity,
            window,
        })
    }

    /// Use a different bucket key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The dimension this controller limits.
    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    /// The bucket key for a caller identity.
    pub fn bucket_key(&self, identity: &str) -> BucketKey {
        BucketKey::new(&self.namespace, &self.dimension, identity)
    }

    /// Wait for a token from the caller's bucket.
    ///
    /// Returns `Ok(())` once admitted. Gives up with [`AdmissionError::ContentionTimeout`] when
    /// [`ADMISSION_DEADLINE`] passes, with [`AdmissionError::RetriesExhausted`] after
    /// [`MAX_ATTEMPTS`] evaluations, and immediately with [`AdmissionError::StoreFault`]
    /// when the store misbehaves.
    pub async fn admit(&self, identity: &str, request_id: &str) -> Result<(), AdmissionError> {
        let key = self.bucket_key(identity);
        let deadline = Deadline::after(ADMISSION_DEADLINE);

        for attempt in 1..=MAX_ATTEMPTS {
            if deadline.is_elapsed() {
                log::debug!("Admission for '{key}' timed out before attempt {attempt}");
                return Err(AdmissionError::ContentionTimeout);
            }

            let outcome = self
                .store
                .evaluate(&key, self.capacity, self.window, request_id)
                .await
                .inspect_err(|e| log::error!("Bucket evaluation for '{key}' failed: {e}"))?;

            let backoff = match outcome {
                BucketOutcome::Admitted => {
                    log::debug!("Admitted '{key}' on attempt {attempt}");
                    return Ok(());
                }
                BucketOutcome::LockBusy => {
                    log::debug!("Bucket '{key}' is locked, attempt {attempt} backs off for {LOCK_BACKOFF:?}");
                    LOCK_BACKOFF
                }
                BucketOutcome::RetryAfter(wait) => {
                    log::debug!("Bucket '{key}' is empty, attempt {attempt} waits {wait:?} for the refill");
                    wait
                }
            };

            if deadline.sleep(backoff).await.is_err() {
                log::debug!("Admission for '{key}' timed out after attempt {attempt}");
                return Err(AdmissionError::ContentionTimeout);
            }
        }

        log::debug!("Admission for '{key}' gave up after {MAX_ATTEMPTS} attempts");

        Err(AdmissionError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }
}
