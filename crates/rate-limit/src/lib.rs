//! Distributed leaky-bucket admission control for leakygate.
//!
//! One bucket per caller identity lives in a shared store. Every admission
//! attempt runs a single atomic evaluation against that store, and the
//! [`AdmissionController`] drives those evaluations under a fixed deadline and
//! attempt budget:
//!
//! - [`BucketStore`] is the atomic evaluate contract, implemented by
//!   [`RedisStorage`] (the bucket script, shared across processes) and
//!   [`InMemoryStorage`] (single process).
//! - [`Deadline`] races every backoff against the overall deadline.
//! - [`AdmissionController`] turns store outcomes into admit, wait or reject.

#![deny(missing_docs)]

mod controller;
mod deadline;
mod error;
mod key;
mod script;
mod storage;

pub use controller::{ADMISSION_DEADLINE, AdmissionController, LOCK_BACKOFF, MAX_ATTEMPTS};
pub use deadline::{Deadline, DeadlineElapsed};
pub use error::{AdmissionError, ConfigurationError};
pub use key::BucketKey;
pub use script::BUCKET_SCRIPT;
pub use storage::{BucketOutcome, BucketStore, InMemoryStorage, RedisStorage, Storage, StorageError};
