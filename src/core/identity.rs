//! Document identity derivation.
//!
//! A document is identified by two digests computed in one pass over the
//! payload:
//!
//! - `hash`: hex SHA-256 of the content alone, used to spot byte-identical
//!   re-uploads whatever their tag.
//! - `id`: unpadded URL-safe base64 of MD5 over the content followed by the
//!   sanitized tag. Re-uploading the same bytes with the same tag always
//!   yields the same id.
//!
//! [`HashingReader`] is the tee: it wraps the upload stream and feeds both
//! accumulators as bytes flow to their destination, so the payload never
//! has to be buffered or read twice.

use crate::core::types::DocumentId;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::io::AsyncRead;
use futures::ready;
use md5::Md5;
use pin_project_lite::pin_project;
use sha2::{Digest, Sha256};
use std::pin::Pin;
use std::task::{Context, Poll};
use unicode_general_category::{get_general_category, GeneralCategory};

/// Maximum tag length in bytes, applied before character filtering.
pub const TAG_MAX_LENGTH: usize = 128;

/// Name of the content hash algorithm, as reported to callers.
pub const HASH_ALGORITHM: &str = "SHA-256";

const ID_DIGEST_LEN: usize = 16;
const HASH_HEX_LEN: usize = 64;

/// Sanitizes a caller-supplied tag.
///
/// The tag is truncated to [`TAG_MAX_LENGTH`] bytes (never inside a UTF-8
/// character), then letters, decimal digits, `-`, `_` and `.` are kept,
/// spaces become `_` and everything else is dropped. Letters and digits
/// are classified by Unicode general category (`L*` and `Nd`).
///
/// ```rust
/// use scangate::core::identity::sanitize_tag;
///
/// assert_eq!(sanitize_tag("annual report 2024.pdf"), "annual_report_2024.pdf");
/// assert_eq!(sanitize_tag("<script>alert(1)</script>"), "scriptalert1script");
/// ```
pub fn sanitize_tag(tag: &str) -> String {
    let mut end = tag.len().min(TAG_MAX_LENGTH);
    while !tag.is_char_boundary(end) {
        end -= 1;
    }

    tag[..end]
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '-' | '_' | '.' => Some(c),
            c if is_letter_or_digit(c) => Some(c),
            _ => None,
        })
        .collect()
}

fn is_letter_or_digit(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
            | GeneralCategory::DecimalNumber
    )
}

/// Returns `true` if `id` decodes to a 16-byte digest.
pub fn is_valid_id(id: &str) -> bool {
    URL_SAFE_NO_PAD
        .decode(id)
        .map(|bytes| bytes.len() == ID_DIGEST_LEN)
        .unwrap_or(false)
}

/// Returns `true` if `hash` looks like a hex SHA-256 digest.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// The `(hash, id)` pair derived for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    /// Hex SHA-256 of the content.
    pub hash: String,
    /// Content-and-tag derived id.
    pub id: DocumentId,
    /// Number of content bytes that went into the digests.
    pub size: u64,
}

/// Incremental accumulator for both identity digests.
#[derive(Debug, Clone, Default)]
pub struct IdentityHasher {
    sha256: Sha256,
    md5: Md5,
    bytes: u64,
}

impl IdentityHasher {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.sha256.update(chunk);
        self.md5.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of content bytes seen so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finalizes both digests, mixing `tag` into the id only.
    ///
    /// `tag` is expected to be sanitized already.
    pub fn finish(self, tag: &str) -> DocumentIdentity {
        let hash = format!("{:x}", self.sha256.finalize());

        let mut md5 = self.md5;
        md5.update(tag.as_bytes());
        let id = URL_SAFE_NO_PAD.encode(md5.finalize());

        DocumentIdentity {
            hash,
            id: DocumentId(id),
            size: self.bytes,
        }
    }
}

/// Derives the identity of an in-memory payload.
pub fn derive_identity(content: &[u8], tag: &str) -> DocumentIdentity {
    let mut hasher = IdentityHasher::new();
    hasher.update(content);
    hasher.finish(tag)
}

pin_project! {
    /// Async reader that hashes everything read through it.
    ///
    /// ```rust
    /// # futures::executor::block_on(async {
    /// use futures::io::AsyncReadExt;
    /// use scangate::core::identity::{derive_identity, HashingReader};
    ///
    /// let mut reader = HashingReader::new(&b"payload"[..]);
    /// let mut sink = Vec::new();
    /// reader.read_to_end(&mut sink).await.unwrap();
    ///
    /// assert_eq!(reader.finish("tag"), derive_identity(b"payload", "tag"));
    /// # });
    /// ```
    pub struct HashingReader<R> {
        #[pin]
        inner: R,
        hasher: IdentityHasher,
    }
}

impl<R> HashingReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: IdentityHasher::new(),
        }
    }

    /// Number of bytes read through the wrapper so far.
    pub fn bytes_read(&self) -> u64 {
        self.hasher.bytes_hashed()
    }

    /// Finalizes the digests of everything read so far.
    pub fn finish(self, tag: &str) -> DocumentIdentity {
        self.hasher.finish(tag)
    }
}

impl<R: AsyncRead> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.project();
        let n = ready!(this.inner.poll_read(cx, buf))?;
        this.hasher.update(&buf[..n]);
        Poll::Ready(Ok(n))
    }
}
