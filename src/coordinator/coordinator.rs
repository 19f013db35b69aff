//! Detached, concurrency-bounded scans of pending documents.

use crate::audit;
use crate::coordinator::retry::RetryLadder;
use crate::core::{ByteStream, DocumentId, MetadataError, ScanError, Verdict};
use crate::engine::ArcScanEngine;
use crate::store::{ArcBinaryStore, ArcMetadataStore};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default number of scans allowed in flight.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 128;

/// Default deadline for one engine call.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the scan coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum number of scans in flight. Never below 1.
    pub capacity: usize,

    /// Waits between attempts; one attempt per entry.
    pub ladder: RetryLadder,

    /// Deadline for each engine call.
    #[serde(with = "crate::service::config::duration_millis")]
    pub attempt_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SCAN_CONCURRENCY,
            ladder: RetryLadder::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent scans.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Sets the retry ladder.
    pub fn with_ladder(mut self, ladder: RetryLadder) -> Self {
        self.ladder = ladder;
        self
    }

    /// Sets the per-attempt deadline.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

/// Schedules scans of pending documents and records their verdicts.
///
/// Each scan runs as its own tokio task, independent of whoever scheduled
/// it. A semaphore bounds how many scans are in flight; a scan holds its
/// permit across retries and releases it on every exit path.
///
/// Cloning is cheap and clones share the same semaphore.
#[derive(Debug, Clone)]
pub struct ScanCoordinator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    binary: ArcBinaryStore,
    metadata: ArcMetadataStore,
    engine: ArcScanEngine,
    semaphore: Arc<Semaphore>,
    capacity: usize,
    ladder: RetryLadder,
    attempt_timeout: Duration,
}

enum ScanFailure {
    Retryable(String),
    Fatal(String),
}

impl ScanCoordinator {
    /// Creates a coordinator over the given capabilities.
    pub fn new(
        binary: ArcBinaryStore,
        metadata: ArcMetadataStore,
        engine: ArcScanEngine,
        config: CoordinatorConfig,
    ) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                binary,
                metadata,
                engine,
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                ladder: config.ladder,
                attempt_timeout: config.attempt_timeout,
            }),
        }
    }

    /// Starts a detached scan of `id` and returns immediately.
    ///
    /// Dropping the returned handle does not cancel the scan.
    pub fn schedule(&self, id: DocumentId) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tracing::debug!(document_id = %id, "Scan scheduled");
        tokio::spawn(async move { inner.run(id).await })
    }

    /// Maximum number of scans in flight.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of scans currently holding a permit.
    pub fn active_scans(&self) -> usize {
        self.inner.capacity - self.inner.semaphore.available_permits()
    }

    /// The retry ladder in use.
    pub fn ladder(&self) -> &RetryLadder {
        &self.inner.ladder
    }
}

impl Inner {
    async fn run(&self, id: DocumentId) {
        let _permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(document_id = %id, "Scan semaphore closed; scan not started");
                return;
            }
        };

        let mut first = match self.binary.get(&id).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::error!(
                    document_id = %id,
                    error = %e,
                    "Cannot read pending bytes; scan not started"
                );
                return;
            }
        };

        let attempts = self.ladder.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if let Some(delay) = self.ladder.delay_before(attempt) {
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&id, first.take()).await {
                Ok(verdict) => {
                    self.record(&id, &verdict, attempt).await;
                    return;
                }
                Err(ScanFailure::Retryable(reason)) => {
                    tracing::warn!(
                        document_id = %id,
                        attempt = attempt,
                        max_attempts = attempts,
                        error = %reason,
                        "Scan attempt failed"
                    );
                    last_error = reason;
                }
                Err(ScanFailure::Fatal(reason)) => {
                    audit::emit_scan_abandoned(&id, attempt, &reason);
                    return;
                }
            }
        }

        audit::emit_scan_abandoned(&id, attempts, &last_error);
    }

    /// One engine call under the attempt deadline.
    async fn attempt(
        &self,
        id: &DocumentId,
        stream: Option<ByteStream>,
    ) -> Result<Verdict, ScanFailure> {
        let stream = match stream {
            Some(stream) => stream,
            None => self
                .binary
                .get(id)
                .await
                .map_err(|e| ScanFailure::Retryable(format!("re-reading bytes failed: {}", e)))?,
        };

        match tokio::time::timeout(self.attempt_timeout, self.engine.analyze(stream)).await {
            Ok(Ok(verdict)) => Ok(verdict),
            Ok(Err(e)) if !e.is_recoverable() => Err(ScanFailure::Fatal(e.to_string())),
            Ok(Err(e)) => Err(ScanFailure::Retryable(e.to_string())),
            Err(_) => Err(ScanFailure::Retryable(
                ScanError::timeout(self.engine.name(), self.attempt_timeout).to_string(),
            )),
        }
    }

    /// Persists the verdict, then releases the bytes.
    async fn record(&self, id: &DocumentId, verdict: &Verdict, attempt: usize) {
        match self
            .metadata
            .update_status(id, verdict.status(), Utc::now())
            .await
        {
            Ok(()) => {
                audit::emit_verdict_recorded(id, verdict, self.engine.name(), attempt);
            }
            Err(MetadataError::AlreadyAnalyzed { .. }) => {
                tracing::info!(document_id = %id, "Document already has a verdict; keeping it");
            }
            Err(e) => {
                audit::emit_verdict_lost(id, verdict, &e);
                return;
            }
        }

        match self.binary.delete(id).await {
            Ok(()) => audit::emit_bytes_released(id),
            Err(e) if e.is_not_found() => {
                tracing::debug!(document_id = %id, "Bytes already released");
            }
            Err(e) => {
                tracing::warn!(
                    document_id = %id,
                    error = %e,
                    "Failed to delete bytes after verdict"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::derive_identity;
    use crate::core::{AnalysisStatus, BytesReader, Document};
    use crate::engine::mock::{MockEngine, EICAR};
    use crate::store::{BinaryStore, InMemoryBinaryStore, InMemoryMetadataStore, MetadataStore};

    struct Fixture {
        binary: Arc<InMemoryBinaryStore>,
        metadata: Arc<InMemoryMetadataStore>,
        engine: Arc<MockEngine>,
        coordinator: ScanCoordinator,
    }

    fn fixture(engine: MockEngine, config: CoordinatorConfig) -> Fixture {
        let binary = Arc::new(InMemoryBinaryStore::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let engine = Arc::new(engine);
        let coordinator = ScanCoordinator::new(
            binary.clone(),
            metadata.clone(),
            engine.clone(),
            config,
        );
        Fixture {
            binary,
            metadata,
            engine,
            coordinator,
        }
    }

    impl Fixture {
        async fn seed(&self, content: &[u8], tag: &str) -> DocumentId {
            let identity = derive_identity(content, tag);
            self.binary
                .save(
                    &identity.id,
                    BytesReader::new(content.to_vec()).into_stream(),
                    content.len() as u64,
                )
                .await
                .unwrap();
            let doc = Document::new_pending(identity.id.clone(), identity.hash, tag);
            self.metadata.save(&doc).await.unwrap();
            identity.id
        }

        async fn status(&self, id: &DocumentId) -> AnalysisStatus {
            self.metadata.get(id).await.unwrap().status
        }
    }

    #[tokio::test]
    async fn test_clean_scan_records_verdict_and_releases_bytes() {
        let f = fixture(MockEngine::new(), CoordinatorConfig::new());
        let id = f.seed(b"plain text", "notes").await;

        f.coordinator.schedule(id.clone()).await.unwrap();

        assert_eq!(f.status(&id).await, AnalysisStatus::Clean);
        assert!(f.metadata.get(&id).await.unwrap().analyzed_at.is_some());
        assert!(!f.binary.contains(&id));
        assert_eq!(f.coordinator.active_scans(), 0);
    }

    #[tokio::test]
    async fn test_eicar_is_recorded_infected() {
        let f = fixture(MockEngine::new(), CoordinatorConfig::new());
        let id = f.seed(EICAR, "eicar").await;

        f.coordinator.schedule(id.clone()).await.unwrap();

        assert_eq!(f.status(&id).await, AnalysisStatus::Infected);
        assert!(matches!(f.binary.get(&id).await, Err(e) if e.is_not_found()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_follow_the_ladder() {
        let f = fixture(MockEngine::new().with_failures(2), CoordinatorConfig::new());
        let id = f.seed(b"retry me", "retry").await;

        let start = tokio::time::Instant::now();
        f.coordinator.schedule(id.clone()).await.unwrap();

        assert_eq!(f.engine.call_count(), 3);
        assert_eq!(f.status(&id).await, AnalysisStatus::Clean);
        assert!(start.elapsed() >= Duration::from_secs(15));
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_keeps_document_pending_and_bytes() {
        let engine = MockEngine::new();
        engine.set_failing(true);
        let f = fixture(engine, CoordinatorConfig::new());
        let id = f.seed(b"unlucky", "unlucky").await;

        let start = tokio::time::Instant::now();
        f.coordinator.schedule(id.clone()).await.unwrap();

        assert_eq!(f.engine.call_count(), 6);
        assert_eq!(f.status(&id).await, AnalysisStatus::Pending);
        assert!(f.binary.contains(&id));
        // 5 + 10 + 15 + 25 + 40; the final 65 s wait is never slept.
        assert!(start.elapsed() >= Duration::from_secs(95));
        assert!(start.elapsed() < Duration::from_secs(160));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_deadline_counts_as_failure() {
        let config = CoordinatorConfig::new()
            .with_ladder(RetryLadder::single_attempt())
            .with_attempt_timeout(Duration::from_secs(1));
        let f = fixture(MockEngine::new().with_latency(Duration::from_secs(60)), config);
        let id = f.seed(b"slow", "slow").await;

        f.coordinator.schedule(id.clone()).await.unwrap();

        assert_eq!(f.engine.call_count(), 1);
        assert_eq!(f.status(&id).await, AnalysisStatus::Pending);
        assert!(f.binary.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_bounds_concurrent_scans() {
        let config = CoordinatorConfig::new().with_capacity(1);
        let f = fixture(MockEngine::new().with_latency(Duration::from_secs(1)), config);
        let a = f.seed(b"first", "a").await;
        let b = f.seed(b"second", "b").await;

        let first = f.coordinator.schedule(a.clone());
        let second = f.coordinator.schedule(b.clone());
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(f.engine.peak_concurrency(), 1);
        assert_eq!(f.status(&a).await, AnalysisStatus::Clean);
        assert_eq!(f.status(&b).await, AnalysisStatus::Clean);
        assert_eq!(f.coordinator.capacity(), 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised_to_one() {
        let config = CoordinatorConfig {
            capacity: 0,
            ..CoordinatorConfig::default()
        };
        let f = fixture(MockEngine::new(), config);
        assert_eq!(f.coordinator.capacity(), 1);
    }

    #[tokio::test]
    async fn test_missing_bytes_skip_the_engine() {
        let f = fixture(MockEngine::new(), CoordinatorConfig::new());
        let identity = derive_identity(b"gone", "gone");
        let doc = Document::new_pending(identity.id.clone(), identity.hash, "gone");
        f.metadata.save(&doc).await.unwrap();

        f.coordinator.schedule(identity.id.clone()).await.unwrap();

        assert_eq!(f.engine.call_count(), 0);
        assert_eq!(f.status(&identity.id).await, AnalysisStatus::Pending);
    }

    #[tokio::test]
    async fn test_lost_verdict_write_keeps_bytes() {
        let f = fixture(MockEngine::new(), CoordinatorConfig::new());
        let id = f.seed(b"payload", "lost").await;
        f.metadata.set_online(false);

        f.coordinator.schedule(id.clone()).await.unwrap();

        f.metadata.set_online(true);
        assert_eq!(f.engine.call_count(), 1);
        assert_eq!(f.status(&id).await, AnalysisStatus::Pending);
        assert!(f.binary.contains(&id));
    }

    #[tokio::test]
    async fn test_existing_verdict_is_never_overwritten() {
        let f = fixture(MockEngine::new(), CoordinatorConfig::new());
        let id = f.seed(EICAR, "already").await;
        f.metadata
            .update_status(&id, AnalysisStatus::Clean, Utc::now())
            .await
            .unwrap();

        f.coordinator.schedule(id.clone()).await.unwrap();

        assert_eq!(f.status(&id).await, AnalysisStatus::Clean);
        assert!(!f.binary.contains(&id));
    }

    #[derive(Debug, Default)]
    struct MisconfiguredEngine {
        calls: std::sync::atomic::AtomicU64,
    }

    #[async_trait::async_trait]
    impl crate::engine::ScanEngine for MisconfiguredEngine {
        fn name(&self) -> &str {
            "misconfigured"
        }

        async fn analyze(&self, _data: ByteStream) -> Result<Verdict, ScanError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(ScanError::configuration("no socket configured"))
        }

        async fn ping(&self) -> Result<(), ScanError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_error_abandons_without_retrying() {
        let f = fixture(MockEngine::new(), CoordinatorConfig::new());
        let id = f.seed(b"never scanned", "config").await;

        let engine = Arc::new(MisconfiguredEngine::default());
        let coordinator = ScanCoordinator::new(
            f.binary.clone(),
            f.metadata.clone(),
            engine.clone(),
            CoordinatorConfig::new(),
        );

        let start = tokio::time::Instant::now();
        coordinator.schedule(id.clone()).await.unwrap();

        assert_eq!(engine.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(f.status(&id).await, AnalysisStatus::Pending);
        assert!(f.binary.contains(&id));
        assert_eq!(coordinator.active_scans(), 0);
    }
}
