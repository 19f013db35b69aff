//! The scan engine capability.

use crate::core::error::ScanError;
use crate::core::{ByteStream, Verdict};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A malware scanning engine.
///
/// # Implementation Notes
///
/// - Implementations must be safe for concurrent use.
/// - `analyze` consumes the stream; a retry always gets a fresh one.
/// - Any outcome that is neither clean nor infected must be returned as an
///   error so the caller retries. Never map an unclear answer to `Clean`.
/// - Deadlines are imposed by the caller; `analyze` may be cancelled at any
///   `.await` point.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scangate::engine::ScanEngine;
/// use scangate::core::{ByteStream, ScanError, Verdict};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct RemoteEngine {
///     endpoint: String,
/// }
///
/// #[async_trait]
/// impl ScanEngine for RemoteEngine {
///     fn name(&self) -> &str {
///         "remote"
///     }
///
///     async fn analyze(&self, data: ByteStream) -> Result<Verdict, ScanError> {
///         // Upload the stream and interpret the answer...
///         todo!()
///     }
///
///     async fn ping(&self) -> Result<(), ScanError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ScanEngine: Send + Sync + Debug {
    /// Stable, human-readable identifier such as "clamav".
    fn name(&self) -> &str;

    /// Reads `data` to the end and returns a definitive verdict.
    ///
    /// # Errors
    ///
    /// - `EngineUnavailable` / `ConnectionFailed` - the engine cannot be reached.
    /// - `AmbiguousResponse` - the engine answered without a verdict.
    /// - `Io` - the payload stream failed.
    async fn analyze(&self, data: ByteStream) -> Result<Verdict, ScanError>;

    /// Checks that the engine is reachable.
    async fn ping(&self) -> Result<(), ScanError>;
}

/// An arc-wrapped engine for shared ownership.
pub type ArcScanEngine = Arc<dyn ScanEngine>;
