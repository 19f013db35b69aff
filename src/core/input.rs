//! Byte stream and upload request abstractions.
//!
//! Payloads travel through the library as [`ByteStream`]s so that neither
//! the upload path nor the scan path needs to hold a whole document in
//! memory.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::io::AsyncRead;
use pin_project_lite::pin_project;

/// A boxed, single-pass async byte stream.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Boxes any compatible reader into a [`ByteStream`].
pub fn boxed(reader: impl AsyncRead + Send + Unpin + 'static) -> ByteStream {
    Box::new(reader)
}

pin_project! {
    /// A wrapper that allows reading owned bytes as an async stream.
    pub struct BytesReader {
        data: Vec<u8>,
        position: usize,
    }
}

impl BytesReader {
    /// Creates a new `BytesReader` from the given bytes.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// Boxes the reader into a [`ByteStream`].
    pub fn into_stream(self) -> ByteStream {
        Box::new(self)
    }
}

impl AsyncRead for BytesReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.project();
        let remaining = &this.data[*this.position..];
        let to_copy = std::cmp::min(buf.len(), remaining.len());
        buf[..to_copy].copy_from_slice(&remaining[..to_copy]);
        *this.position += to_copy;
        Poll::Ready(Ok(to_copy))
    }
}

/// An upload submitted to [`DocumentService::upload`](crate::service::DocumentService::upload).
///
/// # Examples
///
/// ```rust
/// use scangate::core::UploadRequest;
///
/// let request = UploadRequest::from_bytes(b"%PDF-1.7 ...".to_vec())
///     .with_tag("quarterly report")
///     .with_filename("q3.pdf");
/// assert_eq!(request.declared_size(), 12);
/// ```
pub struct UploadRequest {
    stream: ByteStream,
    declared_size: u64,
    tag: Option<String>,
    filename: Option<String>,
}

impl UploadRequest {
    /// Creates a request from a stream and its declared size.
    ///
    /// At most `declared_size` bytes are read from the stream.
    pub fn new(stream: ByteStream, declared_size: u64) -> Self {
        Self {
            stream,
            declared_size,
            tag: None,
            filename: None,
        }
    }

    /// Creates a request from in-memory bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(BytesReader::new(data).into_stream(), size)
    }

    /// Sets the caller tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the original filename, used as the tag when none is given.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Returns the declared payload size.
    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Returns the raw tag, falling back to the filename when the tag is blank.
    pub fn effective_tag(&self) -> &str {
        match self.tag.as_deref().map(str::trim) {
            Some(tag) if !tag.is_empty() => tag,
            _ => self.filename.as_deref().unwrap_or(""),
        }
    }

    /// Returns the original filename, if known.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub(crate) fn into_stream(self) -> ByteStream {
        self.stream
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("declared_size", &self.declared_size)
            .field("tag", &self.tag)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::AsyncReadExt;

    #[tokio::test]
    async fn test_bytes_reader_reads_everything() {
        let mut reader = BytesReader::new(b"abcdef".to_vec());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[test]
    fn test_effective_tag_prefers_tag() {
        let request = UploadRequest::from_bytes(vec![1, 2, 3])
            .with_tag("eicar")
            .with_filename("sample.com");
        assert_eq!(request.effective_tag(), "eicar");
    }

    #[test]
    fn test_effective_tag_falls_back_to_filename() {
        let request = UploadRequest::from_bytes(vec![1, 2, 3])
            .with_tag("   ")
            .with_filename("sample.com");
        assert_eq!(request.effective_tag(), "sample.com");

        let bare = UploadRequest::from_bytes(vec![1, 2, 3]);
        assert_eq!(bare.effective_tag(), "");
        assert_eq!(bare.declared_size(), 3);
    }
}
