//! Filesystem-based binary store implementation.

use crate::core::error::{StorageError, StorageResult};
use crate::core::input::boxed;
use crate::core::{ByteStream, DocumentId};
use crate::store::traits::BinaryStore;

use async_trait::async_trait;
use futures::io::{AsyncReadExt, AsyncWriteExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
use uuid::Uuid;

/// Binary store keeping one file per pending document.
///
/// Payloads are written to a uniquely named `.part` file first and renamed
/// into place once fully flushed. A crash never leaves a truncated
/// `<id>.bin` behind, and concurrent saves of one id never share a file.
///
/// # Directory Structure
///
/// ```text
/// pending/
/// ├── {id}.bin          # Payload awaiting analysis
/// └── {id}.{uuid}.part  # Payload still being written
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemBinaryStore {
    base_path: PathBuf,
}

impl FilesystemBinaryStore {
    /// Creates a store rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::unavailable(format!(
                "failed to create directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %base_path.display(), "Filesystem binary store ready");
        Ok(Self { base_path })
    }

    /// Returns the directory holding the payloads.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the payload path for `id`, rejecting ids that could escape
    /// the base directory.
    fn data_path(&self, id: &DocumentId) -> StorageResult<PathBuf> {
        if !id.is_valid() {
            return Err(StorageError::InvalidId { id: id.to_string() });
        }
        Ok(self.base_path.join(format!("{}.bin", id.as_str())))
    }

    fn not_found_or(id: &DocumentId, err: std::io::Error) -> StorageError {
        if err.kind() == ErrorKind::NotFound {
            StorageError::NotFound { id: id.to_string() }
        } else {
            StorageError::Io(err)
        }
    }
}

/// Streams `data` into `part`, syncs it and renames it to `path`.
async fn write_part(
    part: &Path,
    path: &Path,
    data: ByteStream,
    size: u64,
) -> std::io::Result<u64> {
    let file = tokio::fs::File::create(part).await?;
    let mut writer = file.compat_write();
    let written = futures::io::copy(data.take(size), &mut writer).await?;

    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    drop(writer);

    tokio::fs::rename(part, path).await?;
    Ok(written)
}

#[async_trait]
impl BinaryStore for FilesystemBinaryStore {
    async fn save(&self, id: &DocumentId, data: ByteStream, size: u64) -> StorageResult<()> {
        let path = self.data_path(id)?;
        let part = self
            .base_path
            .join(format!("{}.{}.part", id, Uuid::new_v4().simple()));

        let save_failed = |e: std::io::Error| StorageError::SaveFailed {
            id: id.to_string(),
            reason: e.to_string(),
        };

        let written = match write_part(&part, &path, data, size).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(save_failed(e));
            }
        };

        tracing::debug!(document_id = %id, bytes = written, "Binary stored");
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> StorageResult<ByteStream> {
        let path = self.data_path(id)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| Self::not_found_or(id, e))?;
        Ok(boxed(file.compat()))
    }

    async fn delete(&self, id: &DocumentId) -> StorageResult<()> {
        let path = self.data_path(id)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Self::not_found_or(id, e))?;

        tracing::debug!(document_id = %id, "Binary deleted");
        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        match tokio::fs::metadata(&self.base_path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::unavailable(format!(
                "{} is not a directory",
                self.base_path.display()
            ))),
            Err(e) => Err(StorageError::unavailable(format!(
                "{}: {}",
                self.base_path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::derive_identity;
    use crate::core::BytesReader;
    use tempfile::TempDir;

    fn id_for(content: &[u8]) -> DocumentId {
        derive_identity(content, "fs-test").id
    }

    #[tokio::test]
    async fn test_filesystem_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemBinaryStore::new(temp_dir.path()).unwrap();
        let payload = vec![42u8; 64 * 1024];
        let id = id_for(&payload);

        store
            .save(&id, BytesReader::new(payload.clone()).into_stream(), payload.len() as u64)
            .await
            .unwrap();
        assert!(temp_dir.path().join(format!("{}.bin", id)).exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);

        let mut out = Vec::new();
        store.get(&id).await.unwrap().read_to_end(&mut out).await.unwrap();
        assert_eq!(out, payload);

        // Bytes stay readable for a second attempt.
        let mut again = Vec::new();
        store.get(&id).await.unwrap().read_to_end(&mut again).await.unwrap();
        assert_eq!(again, payload);

        store.delete(&id).await.unwrap();
        assert!(matches!(store.get(&id).await, Err(e) if e.is_not_found()));
        assert!(store.delete(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_filesystem_store_truncates_to_size() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemBinaryStore::new(temp_dir.path()).unwrap();
        let id = id_for(b"0123456789");

        store
            .save(&id, BytesReader::new(b"0123456789".to_vec()).into_stream(), 3)
            .await
            .unwrap();

        let mut out = Vec::new();
        store.get(&id).await.unwrap().read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"012");
    }

    #[tokio::test]
    async fn test_filesystem_store_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemBinaryStore::new(temp_dir.path()).unwrap();
        let id = DocumentId::from("../../etc/passwd");

        let Err(err) = store.get(&id).await else {
            panic!("malformed id accepted");
        };
        assert!(matches!(err, StorageError::InvalidId { .. }));
    }

    #[tokio::test]
    async fn test_filesystem_store_ping() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("pending");
        let store = FilesystemBinaryStore::new(&root).unwrap();
        assert!(store.ping().await.is_ok());

        std::fs::remove_dir_all(&root).unwrap();
        assert!(matches!(
            store.ping().await,
            Err(StorageError::Unavailable { .. })
        ));
    }

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_part_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemBinaryStore::new(temp_dir.path()).unwrap();
        let payload = b"cannot land".to_vec();
        let id = id_for(&payload);

        // A directory squatting on the final path makes the rename fail.
        let target = temp_dir.path().join(format!("{}.bin", id));
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), b"x").unwrap();

        let err = store
            .save(&id, BytesReader::new(payload.clone()).into_stream(), payload.len() as u64)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SaveFailed { .. }));
        assert_eq!(entries(temp_dir.path()), vec![format!("{}.bin", id)]);
    }

    struct BrokenReader;

    impl futures::io::AsyncRead for BrokenReader {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut [u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::other("connection reset")))
        }
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_no_part_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemBinaryStore::new(temp_dir.path()).unwrap();
        let id = id_for(b"never arrives");

        let err = store.save(&id, boxed(BrokenReader), 13).await.unwrap_err();
        assert!(matches!(err, StorageError::SaveFailed { .. }));
        assert!(entries(temp_dir.path()).is_empty());
    }
}
