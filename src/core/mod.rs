//! Core types and helpers for the scangate library.
//!
//! - [`types`] - Documents, analysis status, verdicts and caller views
//! - [`identity`] - Tag sanitization and single-pass `(hash, id)` derivation
//! - [`input`] - Byte streams and upload requests
//! - [`error`] - Structured error types

pub mod error;
pub mod identity;
pub mod input;
pub mod types;

pub use error::{
    MetadataError, MetadataResult, ScanError, ServiceError, ServiceResult, StorageError,
    StorageResult,
};
pub use identity::{sanitize_tag, DocumentIdentity, HashingReader, IdentityHasher};
pub use input::{ByteStream, BytesReader, UploadRequest};
pub use types::{
    AnalysisStatus, Document, DocumentId, DocumentView, HealthReport, UploadOutcome, Verdict,
};
