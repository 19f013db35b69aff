//! Storage capabilities and their adapters.
//!
//! A document's bytes live in a [`BinaryStore`] only while it is pending;
//! its record lives in a [`MetadataStore`] until the retention sweeper
//! removes it.
//!
//! # Available Implementations
//!
//! - [`InMemoryBinaryStore`] / [`InMemoryMetadataStore`] - process-local, for tests and demos
//! - [`FilesystemBinaryStore`] - one file per pending document
//! - `PostgresMetadataStore` - durable records (requires `postgres` feature)

mod filesystem;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod traits;

pub use filesystem::FilesystemBinaryStore;
pub use memory::{InMemoryBinaryStore, InMemoryMetadataStore};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresMetadataStore};
pub use traits::{ArcBinaryStore, ArcMetadataStore, BinaryStore, MetadataStore};
