//! Error types for admission control.

use crate::storage::StorageError;

/// Why a single request was not admitted.
///
/// Every variant is terminal for the request that produced it and has no effect
/// on other requests, in flight or future, for the same bucket.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The overall deadline elapsed while waiting on lock contention or a refill.
    #[error("Timed out waiting for admission")]
    ContentionTimeout,

    /// The attempt budget was used up without admission.
    #[error("Exceeded {attempts} admission attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The store could not be reached or answered with something unexpected.
    #[error("Storage error: {0}")]
    StoreFault(#[from] StorageError),
}

impl AdmissionError {
    /// Short machine-readable reason, stable for logs and responses.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ContentionTimeout => "timeout",
            Self::RetriesExhausted { .. } => "max_retries",
            Self::StoreFault(_) => "internal_error",
        }
    }
}

/// Errors raised while setting up admission control, before any request is handled.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The bucket capacity was zero.
    #[error("Bucket capacity must be greater than 0")]
    ZeroCapacity,

    /// The window was shorter than the store's expiry granularity.
    #[error("Bucket window must be at least one second, got {0:?}")]
    WindowTooShort(std::time::Duration),

    /// The dimension name was empty.
    #[error("Bucket dimension must not be empty")]
    EmptyDimension,

    /// The store could not be initialized.
    #[error("Failed to initialize bucket store: {0}")]
    Store(#[from] StorageError),
}
