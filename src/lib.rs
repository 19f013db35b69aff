//! # Scangate
//!
//! Upload, deduplicate and asynchronously malware-scan documents behind
//! pluggable storage and scan engines.
//!
//! ## Overview
//!
//! Scangate accepts a document as a byte stream with an optional tag and
//! answers immediately with a stable document id. Analysis happens in the
//! background:
//!
//! - Identical uploads (same bytes, same tag) always resolve to the same id
//! - Byte-identical uploads under a new tag inherit an existing verdict
//!   without being scanned again
//! - Pending documents are scanned by a bounded pool of detached tasks that
//!   retry on a fixed ladder of waits
//! - Bytes are kept only until a verdict is recorded
//! - Analyzed records expire after a configurable TTL
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scangate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = DocumentService::builder()
//!         .with_binary_store(InMemoryBinaryStore::new())
//!         .with_metadata_store(InMemoryMetadataStore::new())
//!         .with_engine(MockEngine::new())
//!         .build()
//!         .await?;
//!
//!     let request = UploadRequest::from_bytes(b"file content".to_vec()).with_tag("notes");
//!     let outcome = service.upload(request).await?;
//!
//!     let document = service.get_document(outcome.id().as_str()).await?;
//!     println!("{} is {}", document.id, document.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `clamav` - ClamAV daemon engine over TCP or a Unix socket
//! - `postgres` - PostgreSQL metadata store via sqlx
//!
//! ## Architecture
//!
//! - **Core**: Documents, identity derivation, byte streams and errors
//! - **Store**: Binary and metadata capabilities with in-memory, filesystem
//!   and PostgreSQL adapters
//! - **Engine**: The scan capability with mock and ClamAV adapters
//! - **Coordinator**: Detached, concurrency-bounded scans with retries
//! - **Retention**: Periodic purge of expired verdicts
//! - **Service**: The facade tying it all together
//! - **Audit**: Structured lifecycle events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod coordinator;
pub mod core;
pub mod engine;
pub mod retention;
pub mod service;
pub mod store;

// Re-export commonly used types at the crate root
pub use crate::core::{
    AnalysisStatus, ByteStream, Document, DocumentId, DocumentView, HealthReport, MetadataError,
    ScanError, ServiceError, ServiceResult, StorageError, UploadOutcome, UploadRequest, Verdict,
};

pub use crate::coordinator::{CoordinatorConfig, RetryLadder, ScanCoordinator};
pub use crate::engine::{MockEngine, ScanEngine};
pub use crate::retention::RetentionSweeper;
pub use crate::service::{DocumentService, DocumentServiceBuilder, ServiceConfig};
pub use crate::store::{BinaryStore, MetadataStore};

/// Prelude module for convenient imports.
///
/// ```rust
/// use scangate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        AnalysisStatus, ByteStream, Document, DocumentId, DocumentView, HealthReport,
        ServiceError, ServiceResult, UploadOutcome, UploadRequest, Verdict,
    };
    pub use crate::coordinator::{CoordinatorConfig, RetryLadder};
    pub use crate::engine::{MockEngine, ScanEngine};
    pub use crate::service::{DocumentService, ServiceConfig};
    pub use crate::store::{
        BinaryStore, FilesystemBinaryStore, InMemoryBinaryStore, InMemoryMetadataStore,
        MetadataStore,
    };
}
