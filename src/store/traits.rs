//! Storage capability traits.

use crate::core::error::{MetadataResult, StorageResult};
use crate::core::{AnalysisStatus, ByteStream, Document, DocumentId};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;

/// Temporary home of payload bytes while a document is pending.
///
/// Implementations must be safe for unrestricted concurrent use.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scangate::store::BinaryStore;
/// use scangate::core::{ByteStream, DocumentId, StorageResult};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct BucketStore {
///     // Your client
/// }
///
/// #[async_trait]
/// impl BinaryStore for BucketStore {
///     async fn save(&self, id: &DocumentId, data: ByteStream, size: u64) -> StorageResult<()> {
///         todo!()
///     }
///
///     async fn get(&self, id: &DocumentId) -> StorageResult<ByteStream> {
///         todo!()
///     }
///
///     async fn delete(&self, id: &DocumentId) -> StorageResult<()> {
///         todo!()
///     }
///
///     async fn ping(&self) -> StorageResult<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BinaryStore: Send + Sync + Debug {
    /// Stores at most `size` bytes read from `data` under `id`.
    ///
    /// When this returns `Ok`, the bytes must be durably stored.
    async fn save(&self, id: &DocumentId, data: ByteStream, size: u64) -> StorageResult<()>;

    /// Opens a fresh stream over the bytes stored under `id`.
    ///
    /// Returns `StorageError::NotFound` if nothing is stored.
    async fn get(&self, id: &DocumentId) -> StorageResult<ByteStream>;

    /// Removes the bytes stored under `id`.
    ///
    /// Returns `StorageError::NotFound` if nothing is stored.
    async fn delete(&self, id: &DocumentId) -> StorageResult<()>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> StorageResult<()>;
}

/// Durable document records, keyed by id and searchable by hash.
#[async_trait]
pub trait MetadataStore: Send + Sync + Debug {
    /// Inserts a new document.
    ///
    /// Returns `MetadataError::AlreadyExists` if the id is taken.
    async fn save(&self, document: &Document) -> MetadataResult<()>;

    /// Fetches a document by id.
    async fn get(&self, id: &DocumentId) -> MetadataResult<Document>;

    /// Fetches a document with the given content hash.
    ///
    /// Several documents may share a hash. Implementations return the most
    /// recently created one that already has a verdict, or failing that
    /// the most recently created one.
    async fn get_by_hash(&self, hash: &str) -> MetadataResult<Document>;

    /// Records the verdict of a pending document.
    ///
    /// Returns `MetadataError::NotFound` for unknown ids and
    /// `MetadataError::AlreadyAnalyzed` if the document is not pending.
    async fn update_status(
        &self,
        id: &DocumentId,
        status: AnalysisStatus,
        analyzed_at: DateTime<Utc>,
    ) -> MetadataResult<()>;

    /// Deletes a document by id.
    async fn delete(&self, id: &DocumentId) -> MetadataResult<()>;

    /// Deletes every non-pending document created before `cutoff`.
    ///
    /// Returns the number of deleted documents.
    async fn purge(&self, cutoff: DateTime<Utc>) -> MetadataResult<u64>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> MetadataResult<()>;
}

/// An arc-wrapped binary store for shared ownership.
pub type ArcBinaryStore = Arc<dyn BinaryStore>;

/// An arc-wrapped metadata store for shared ownership.
pub type ArcMetadataStore = Arc<dyn MetadataStore>;
