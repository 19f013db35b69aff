//! Mock engine for testing.
//!
//! This module provides a configurable engine that detects the EICAR test
//! signature and can simulate latency, outages and transient failures
//! without a real scanning daemon.

use crate::core::{ByteStream, ScanError, Verdict};
use crate::engine::traits::ScanEngine;

use async_trait::async_trait;
use futures::io::AsyncReadExt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// The EICAR anti-malware test file.
pub const EICAR: &[u8] =
    b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Threat name reported for EICAR.
pub const EICAR_THREAT: &str = "Eicar-Test-Signature";

/// A mock engine for testing purposes.
///
/// Payloads containing [`EICAR`] are infected; everything else is clean.
///
/// # Examples
///
/// ```rust
/// use scangate::engine::MockEngine;
/// use std::time::Duration;
///
/// let engine = MockEngine::new()
///     .with_latency(Duration::from_millis(50))
///     .with_failures(2);
/// assert_eq!(engine.call_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockEngine {
    name: String,
    latency: Option<Duration>,
    online: AtomicBool,
    fail_always: AtomicBool,
    fail_next: AtomicU32,
    calls: AtomicU64,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockEngine {
    /// Creates an online engine with no latency and no forced failures.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            latency: None,
            online: AtomicBool::new(true),
            fail_always: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
            calls: AtomicU64::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Sets the name of this engine.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the simulated analysis latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next `n` analyses fail.
    pub fn with_failures(self, n: u32) -> Self {
        self.fail_next.store(n, Ordering::SeqCst);
        self
    }

    /// Makes every analysis fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.fail_always.store(failing, Ordering::SeqCst);
    }

    /// Makes the next `n` analyses fail.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Switches the engine on or off. An offline engine fails pings and analyses.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of `analyze` calls so far, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of analyses observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn take_forced_failure(&self) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the active counter even when the analysis is cancelled.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[async_trait]
impl ScanEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, mut data: ByteStream) -> Result<Verdict, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.online.load(Ordering::SeqCst) {
            return Err(ScanError::engine_unavailable(&self.name, "mock engine is offline"));
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.take_forced_failure() {
            return Err(ScanError::connection_failed(&self.name, "simulated failure"));
        }

        let mut payload = Vec::new();
        data.read_to_end(&mut payload).await?;

        if contains(&payload, EICAR) {
            Ok(Verdict::infected(EICAR_THREAT))
        } else {
            Ok(Verdict::Clean)
        }
    }

    async fn ping(&self) -> Result<(), ScanError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ScanError::engine_unavailable(&self.name, "mock engine is offline"))
        }
    }
}
