//! In-memory store implementations.
//!
//! Both stores keep everything in a `RwLock<HashMap>` and can be switched
//! offline to simulate an unreachable dependency. They back the unit tests
//! and the demo program, and are adequate for single-process deployments
//! that accept losing state on restart.

use crate::core::error::{MetadataError, MetadataResult, StorageError, StorageResult};
use crate::core::{AnalysisStatus, ByteStream, BytesReader, Document, DocumentId};
use crate::store::traits::{BinaryStore, MetadataStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::AsyncReadExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// Binary store holding payloads in memory.
#[derive(Debug)]
pub struct InMemoryBinaryStore {
    objects: RwLock<HashMap<DocumentId, Vec<u8>>>,
    online: AtomicBool,
    saves: AtomicU64,
}

impl InMemoryBinaryStore {
    /// Creates an empty, online store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            saves: AtomicU64::new(0),
        }
    }

    /// Switches the store on or off.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns `true` if bytes are stored under `id`.
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(id)
    }

    /// Returns a copy of the bytes stored under `id`.
    pub fn bytes(&self, id: &DocumentId) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable("in-memory binary store is offline"))
        }
    }
}

impl Default for InMemoryBinaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BinaryStore for InMemoryBinaryStore {
    async fn save(&self, id: &DocumentId, data: ByteStream, size: u64) -> StorageResult<()> {
        self.check_online()?;

        let mut buffer = Vec::new();
        data.take(size).read_to_end(&mut buffer).await?;

        self.objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone(), buffer);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> StorageResult<ByteStream> {
        self.check_online()?;
        self.bytes(id)
            .map(|data| BytesReader::new(data).into_stream())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn delete(&self, id: &DocumentId) -> StorageResult<()> {
        self.check_online()?;
        self.objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn ping(&self) -> StorageResult<()> {
        self.check_online()
    }
}

/// Metadata store holding documents in memory.
#[derive(Debug)]
pub struct InMemoryMetadataStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
    online: AtomicBool,
}

impl InMemoryMetadataStore {
    /// Creates an empty, online store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Switches the store on or off.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if no document is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> MetadataResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MetadataError::unavailable("in-memory metadata store is offline"))
        }
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn save(&self, document: &Document) -> MetadataResult<()> {
        self.check_online()?;
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if documents.contains_key(&document.id) {
            return Err(MetadataError::AlreadyExists {
                id: document.id.to_string(),
            });
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> MetadataResult<Document> {
        self.check_online()?;
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| MetadataError::not_found(id.as_str()))
    }

    async fn get_by_hash(&self, hash: &str) -> MetadataResult<Document> {
        self.check_online()?;
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|d| d.hash == hash)
            .max_by_key(|d| (!d.is_pending(), d.created_at))
            .cloned()
            .ok_or_else(|| MetadataError::not_found(hash))
    }

    async fn update_status(
        &self,
        id: &DocumentId,
        status: AnalysisStatus,
        analyzed_at: DateTime<Utc>,
    ) -> MetadataResult<()> {
        self.check_online()?;
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let document = documents
            .get_mut(id)
            .ok_or_else(|| MetadataError::not_found(id.as_str()))?;
        if !document.is_pending() {
            return Err(MetadataError::AlreadyAnalyzed { id: id.to_string() });
        }
        document.status = status;
        document.analyzed_at = Some(analyzed_at);
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> MetadataResult<()> {
        self.check_online()?;
        self.documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MetadataError::not_found(id.as_str()))
    }

    async fn purge(&self, cutoff: DateTime<Utc>) -> MetadataResult<u64> {
        self.check_online()?;
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = documents.len();
        documents.retain(|_, d| !d.is_purgeable(cutoff));
        Ok((before - documents.len()) as u64)
    }

    async fn ping(&self) -> MetadataResult<()> {
        self.check_online()
    }
}
