//! Overall deadline of one admission, shared by every backoff sleep.

use std::time::Duration;

use tokio::time::Instant;

/// The deadline passed before a sleep finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline elapsed")]
pub struct DeadlineElapsed;

/// A fixed point in time after which waiting is pointless.
///
/// Every sleep taken through a deadline races against it, so a long backoff wakes
/// up the moment the deadline passes instead of oversleeping it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Whether the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Sleep for `duration`, or until the deadline if that comes first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), DeadlineElapsed> {
        tokio::time::timeout_at(self.at, tokio::time::sleep(duration))
            .await
            .map_err(|_| DeadlineElapsed)
    }
}
