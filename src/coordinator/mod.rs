//! Asynchronous scan coordination.
//!
//! This module provides:
//! - [`ScanCoordinator`] - runs detached, semaphore-gated scans and records verdicts
//! - [`RetryLadder`] - the fixed waits between scan attempts

#[allow(clippy::module_inception)]
mod coordinator;
mod retry;

pub use coordinator::{
    CoordinatorConfig, ScanCoordinator, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_SCAN_CONCURRENCY,
};
pub use retry::{RetryLadder, DEFAULT_LADDER_SECS};
