//! The document service.
//!
//! [`DocumentService`] ties the capabilities together: it accepts uploads,
//! deduplicates them by content and tag, hands pending documents to the
//! scan coordinator and serves the recorded verdicts.

pub(crate) mod config;
#[allow(clippy::module_inception)]
mod service;

pub use config::{ServiceConfig, DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_RESULT_TTL_SECS};
pub use service::{DocumentService, DocumentServiceBuilder};
