//! The document service facade.

use crate::audit;
use crate::coordinator::ScanCoordinator;
use crate::core::identity::{is_valid_id, sanitize_tag, DocumentIdentity, HashingReader};
use crate::core::input::boxed;
use crate::core::{
    Document, DocumentId, DocumentView, HealthReport, MetadataError, ServiceError, ServiceResult,
    UploadOutcome, UploadRequest,
};
use crate::engine::{ArcScanEngine, ScanEngine};
use crate::retention::RetentionSweeper;
use crate::service::config::ServiceConfig;
use crate::store::{ArcBinaryStore, ArcMetadataStore, BinaryStore, MetadataStore};

use futures::io::{AsyncReadExt, AsyncWriteExt};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::AsyncSeekExt;
use tokio::task::JoinHandle;
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

/// Builder for creating a [`DocumentService`].
///
/// # Examples
///
/// ```rust,no_run
/// use scangate::engine::MockEngine;
/// use scangate::service::{DocumentService, ServiceConfig};
/// use scangate::store::{InMemoryBinaryStore, InMemoryMetadataStore};
///
/// # async fn run() -> Result<(), scangate::core::ServiceError> {
/// let service = DocumentService::builder()
///     .with_binary_store(InMemoryBinaryStore::new())
///     .with_metadata_store(InMemoryMetadataStore::new())
///     .with_engine(MockEngine::new())
///     .with_config(ServiceConfig::new().with_version("1.0.0"))
///     .build()
///     .await?;
/// assert_eq!(service.version(), "1.0.0");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct DocumentServiceBuilder {
    binary: Option<ArcBinaryStore>,
    metadata: Option<ArcMetadataStore>,
    engine: Option<ArcScanEngine>,
    config: ServiceConfig,
}

impl DocumentServiceBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the binary store.
    pub fn with_binary_store<B: BinaryStore + 'static>(mut self, store: B) -> Self {
        self.binary = Some(Arc::new(store));
        self
    }

    /// Sets a shared binary store.
    pub fn with_arc_binary_store(mut self, store: ArcBinaryStore) -> Self {
        self.binary = Some(store);
        self
    }

    /// Sets the metadata store.
    pub fn with_metadata_store<M: MetadataStore + 'static>(mut self, store: M) -> Self {
        self.metadata = Some(Arc::new(store));
        self
    }

    /// Sets a shared metadata store.
    pub fn with_arc_metadata_store(mut self, store: ArcMetadataStore) -> Self {
        self.metadata = Some(store);
        self
    }

    /// Sets the scan engine.
    pub fn with_engine<E: ScanEngine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Sets a shared scan engine.
    pub fn with_arc_engine(mut self, engine: ArcScanEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the service.
    ///
    /// Fails if a capability is missing or if any capability fails its
    /// initial ping. Starts the retention sweeper when the result TTL is
    /// positive, so this must run inside a tokio runtime.
    pub async fn build(self) -> ServiceResult<DocumentService> {
        let binary = self
            .binary
            .ok_or_else(|| ServiceError::configuration("a binary store is required"))?;
        let metadata = self
            .metadata
            .ok_or_else(|| ServiceError::configuration("a metadata store is required"))?;
        let engine = self
            .engine
            .ok_or_else(|| ServiceError::configuration("a scan engine is required"))?;

        ping_all(&binary, &metadata, &engine).await?;

        let coordinator = ScanCoordinator::new(
            binary.clone(),
            metadata.clone(),
            engine.clone(),
            self.config.scan.clone(),
        );
        let sweeper = RetentionSweeper::new(metadata.clone(), self.config.result_ttl).spawn();

        tracing::info!(
            version = %self.config.version,
            engine = %engine.name(),
            scan_capacity = coordinator.capacity(),
            max_upload_size = self.config.max_upload_size,
            auto_purge = sweeper.is_some(),
            "Document service ready"
        );

        Ok(DocumentService {
            binary,
            metadata,
            engine,
            coordinator,
            sweeper,
            config: self.config,
        })
    }
}

/// Accepts uploads, deduplicates them, schedules scans and serves results.
///
/// Dropping the service stops the retention sweeper. Scans already
/// scheduled keep running to completion.
#[derive(Debug)]
pub struct DocumentService {
    binary: ArcBinaryStore,
    metadata: ArcMetadataStore,
    engine: ArcScanEngine,
    coordinator: ScanCoordinator,
    sweeper: Option<JoinHandle<()>>,
    config: ServiceConfig,
}

impl DocumentService {
    /// Creates a new builder.
    pub fn builder() -> DocumentServiceBuilder {
        DocumentServiceBuilder::new()
    }

    /// Version string set at construction.
    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// Information string set at construction.
    pub fn information(&self) -> &str {
        &self.config.information
    }

    /// The configuration in use.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The scan coordinator, for observing in-flight scans.
    pub fn coordinator(&self) -> &ScanCoordinator {
        &self.coordinator
    }

    /// Returns `true` if the retention sweeper is running.
    pub fn auto_purge_enabled(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Uploads a document.
    ///
    /// The payload is read exactly once. Uploading bytes already known
    /// under the same tag returns the existing id; under another tag with a
    /// known verdict, a new id inheriting that verdict. Otherwise the bytes
    /// are stored, a pending document is created and a scan is scheduled.
    pub async fn upload(&self, request: UploadRequest) -> ServiceResult<UploadOutcome> {
        let declared = request.declared_size();
        if declared == 0 {
            return Err(ServiceError::EmptyPayload);
        }
        if declared > self.config.max_upload_size {
            return Err(ServiceError::PayloadTooLarge {
                size: declared,
                max: self.config.max_upload_size,
            });
        }

        let tag = sanitize_tag(request.effective_tag());
        let (spooled, identity) = spool(request, declared, &tag).await?;
        if identity.size == 0 {
            return Err(ServiceError::EmptyPayload);
        }

        let existing = match self.metadata.get_by_hash(&identity.hash).await {
            Ok(doc) => Some(doc),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(existing) = existing {
            if existing.tag == tag {
                tracing::debug!(document_id = %existing.id, "Identical upload already known");
                return Ok(UploadOutcome::AlreadyExists(existing.id));
            }

            if !existing.is_pending() {
                let document = Document::inheriting(identity.id.clone(), tag, &existing);
                return match self.metadata.save(&document).await {
                    Ok(()) => {
                        audit::emit_verdict_propagated(&document, &existing.id);
                        Ok(UploadOutcome::AlreadyExists(document.id))
                    }
                    Err(MetadataError::AlreadyExists { .. }) => {
                        Ok(UploadOutcome::AlreadyExists(identity.id))
                    }
                    Err(e) => Err(e.into()),
                };
            }
        }

        self.create_pending(spooled, identity, tag).await
    }

    /// Stores bytes, then the pending record, then schedules the scan.
    async fn create_pending(
        &self,
        spool: tokio::fs::File,
        identity: DocumentIdentity,
        tag: String,
    ) -> ServiceResult<UploadOutcome> {
        self.binary
            .save(&identity.id, boxed(spool.compat()), identity.size)
            .await?;

        let document = Document::new_pending(identity.id.clone(), identity.hash, tag);
        match self.metadata.save(&document).await {
            Ok(()) => {}
            Err(MetadataError::AlreadyExists { .. }) => {
                return self.reconcile_duplicate(identity.id).await;
            }
            Err(e) => {
                // No record will ever point at these bytes.
                self.discard_bytes(&identity.id).await;
                return Err(e.into());
            }
        }

        audit::emit_document_created(&document, identity.size);
        // Detached: the scan outlives this request.
        drop(self.coordinator.schedule(document.id.clone()));
        Ok(UploadOutcome::Created(document.id))
    }

    /// Another upload of the same content and tag created the record first.
    async fn reconcile_duplicate(&self, id: DocumentId) -> ServiceResult<UploadOutcome> {
        tracing::info!(document_id = %id, "Concurrent upload created this document first");

        let winner_is_pending = match self.metadata.get(&id).await {
            Ok(winner) => winner.is_pending(),
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "Cannot inspect winning upload");
                true
            }
        };

        if !winner_is_pending {
            self.discard_bytes(&id).await;
        }

        Ok(UploadOutcome::AlreadyExists(id))
    }

    /// Best-effort removal of bytes no pending document owns.
    async fn discard_bytes(&self, id: &DocumentId) {
        match self.binary.delete(id).await {
            Ok(()) => tracing::debug!(document_id = %id, "Orphan bytes dropped"),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "Failed to drop orphan bytes");
            }
        }
    }

    /// Fetches a document by id.
    ///
    /// Malformed ids are rejected without querying the metadata store.
    pub async fn get_document(&self, id: &str) -> ServiceResult<Document> {
        if !is_valid_id(id) {
            return Err(ServiceError::InvalidId { id: id.to_string() });
        }

        let id = DocumentId::from(id);
        self.metadata.get(&id).await.map_err(|e| match e {
            MetadataError::NotFound { .. } => ServiceError::NotFound { id: id.to_string() },
            other => other.into(),
        })
    }

    /// Fetches a document rendered for callers.
    pub async fn document_view(&self, id: &str) -> ServiceResult<DocumentView> {
        self.get_document(id).await.map(|doc| DocumentView::from(&doc))
    }

    /// Pings every capability, reporting all failures together.
    pub async fn ping(&self) -> ServiceResult<()> {
        let result = ping_all(&self.binary, &self.metadata, &self.engine).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Service ping failed");
        }
        result
    }

    /// Version, information and aggregated dependency health.
    pub async fn health(&self) -> HealthReport {
        let failures = match self.ping().await {
            Ok(()) => Vec::new(),
            Err(ServiceError::Unhealthy { failures }) => failures,
            Err(other) => vec![other.to_string()],
        };

        HealthReport {
            version: self.config.version.clone(),
            information: self.config.information.clone(),
            healthy: failures.is_empty(),
            failures,
        }
    }
}

impl Drop for DocumentService {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Streams the payload once through the identity tee into an anonymous
/// spool file, rewound and ready to be stored.
async fn spool(
    request: UploadRequest,
    declared: u64,
    tag: &str,
) -> ServiceResult<(tokio::fs::File, DocumentIdentity)> {
    let file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| ServiceError::Transport(std::io::Error::other(e)))??;

    let mut writer = tokio::fs::File::from_std(file).compat_write();
    let mut reader = HashingReader::new(request.into_stream().take(declared));
    futures::io::copy(&mut reader, &mut writer).await?;
    writer.flush().await?;

    let mut file = writer.into_inner();
    file.seek(SeekFrom::Start(0)).await?;

    let identity = reader.finish(tag);
    if identity.size < declared {
        tracing::debug!(
            declared = declared,
            received = identity.size,
            "Upload stream ended before its declared size"
        );
    }
    Ok((file, identity))
}

async fn ping_all(
    binary: &ArcBinaryStore,
    metadata: &ArcMetadataStore,
    engine: &ArcScanEngine,
) -> ServiceResult<()> {
    let (b, m, e) = futures::join!(binary.ping(), metadata.ping(), engine.ping());

    let mut failures = Vec::new();
    if let Err(err) = b {
        failures.push(format!("binary store: {}", err));
    }
    if let Err(err) = m {
        failures.push(format!("metadata store: {}", err));
    }
    if let Err(err) = e {
        failures.push(format!("scan engine '{}': {}", engine.name(), err));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Unhealthy { failures })
    }
}
