//! ClamAV scanning engine.
//!
//! This module provides an engine that talks to the ClamAV daemon (clamd)
//! over its socket protocol.
//!
//! # Requirements
//!
//! - ClamAV daemon (clamd) must be running
//! - Access to clamd over TCP or a Unix socket
//!
//! # Protocol
//!
//! Uses `zINSTREAM`: the payload is sent as length-prefixed chunks read
//! straight from the input stream, terminated by a zero-length chunk. The
//! reply is NUL-terminated.

use crate::core::{ByteStream, ScanError, Verdict};
use crate::engine::traits::ScanEngine;

use async_trait::async_trait;
use futures::io::AsyncReadExt as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt};

const ENGINE: &str = "clamav";
const CHUNK_SIZE: usize = 2048;

/// Where to reach clamd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClamAvEndpoint {
    /// `host:port` address.
    Tcp(String),
    /// Path to the clamd Unix socket.
    Socket(PathBuf),
}

/// ClamAV engine configuration.
#[derive(Debug, Clone)]
pub struct ClamAvConfig {
    /// clamd endpoint.
    pub endpoint: ClamAvEndpoint,

    /// Connection timeout.
    pub connection_timeout: Duration,
}

impl Default for ClamAvConfig {
    fn default() -> Self {
        Self {
            endpoint: ClamAvEndpoint::Tcp("127.0.0.1:3310".to_string()),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

impl ClamAvConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a Unix socket.
    pub fn with_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.endpoint = ClamAvEndpoint::Socket(path.into());
        self
    }

    /// Uses a TCP connection.
    pub fn with_tcp(mut self, address: impl Into<String>) -> Self {
        self.endpoint = ClamAvEndpoint::Tcp(address.into());
        self
    }

    /// Sets the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// ClamAV engine implementation.
///
/// # Example
///
/// ```rust,ignore
/// use scangate::engine::clamav::{ClamAvConfig, ClamAvEngine};
///
/// let engine = ClamAvEngine::new(ClamAvConfig::new().with_tcp("clamav:3310"))?;
/// ```
#[derive(Debug)]
pub struct ClamAvEngine {
    config: ClamAvConfig,
}

impl ClamAvEngine {
    /// Creates a new ClamAV engine with the given configuration.
    pub fn new(config: ClamAvConfig) -> Result<Self, ScanError> {
        match &config.endpoint {
            ClamAvEndpoint::Tcp(addr) if addr.trim().is_empty() => {
                return Err(ScanError::configuration("clamd TCP address is empty"));
            }
            #[cfg(not(unix))]
            ClamAvEndpoint::Socket(_) => {
                return Err(ScanError::configuration(
                    "Unix sockets not supported on this platform",
                ));
            }
            _ => {}
        }
        Ok(Self { config })
    }

    /// Creates a ClamAV engine with default configuration.
    pub fn with_defaults() -> Result<Self, ScanError> {
        Self::new(ClamAvConfig::default())
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &ClamAvConfig {
        &self.config
    }

    /// Opens a connection to clamd.
    async fn connect(&self) -> Result<Box<dyn Duplex>, ScanError> {
        let timeout = self.config.connection_timeout;
        match &self.config.endpoint {
            ClamAvEndpoint::Tcp(addr) => {
                let stream = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr))
                    .await
                    .map_err(|_| ScanError::timeout(ENGINE, timeout))?
                    .map_err(|e| ScanError::connection_failed(ENGINE, e.to_string()))?;
                Ok(Box::new(stream))
            }
            #[cfg(unix)]
            ClamAvEndpoint::Socket(path) => {
                let stream = tokio::time::timeout(timeout, tokio::net::UnixStream::connect(path))
                    .await
                    .map_err(|_| ScanError::timeout(ENGINE, timeout))?
                    .map_err(|e| ScanError::connection_failed(ENGINE, e.to_string()))?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            ClamAvEndpoint::Socket(_) => Err(ScanError::configuration(
                "Unix sockets not supported on this platform",
            )),
        }
    }
}

/// A bidirectional byte stream to clamd.
trait Duplex: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Duplex for T {}

fn io_failed(e: std::io::Error) -> ScanError {
    ScanError::connection_failed(ENGINE, e.to_string())
}

/// Streams `data` to clamd with `zINSTREAM` and returns the raw reply.
async fn instream<C>(conn: &mut C, mut data: ByteStream) -> Result<String, ScanError>
where
    C: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    conn.write_all(b"zINSTREAM\0").await.map_err(io_failed)?;

    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = data.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        conn.write_all(&(n as u32).to_be_bytes())
            .await
            .map_err(io_failed)?;
        conn.write_all(&chunk[..n]).await.map_err(io_failed)?;
    }

    conn.write_all(&0u32.to_be_bytes()).await.map_err(io_failed)?;
    conn.flush().await.map_err(io_failed)?;

    read_reply(conn).await
}

/// Reads a NUL-terminated reply, tolerating a closed connection instead.
async fn read_reply<C>(conn: &mut C) -> Result<String, ScanError>
where
    C: AsyncRead + Unpin + ?Sized,
{
    let mut reply = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = conn.read(&mut buf).await.map_err(io_failed)?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&buf[..n]);
        if reply.contains(&0) {
            break;
        }
    }

    let end = reply.iter().position(|b| *b == 0).unwrap_or(reply.len());
    Ok(String::from_utf8_lossy(&reply[..end]).trim().to_string())
}

/// Interprets a clamd scan reply.
///
/// `stream: OK` is clean and `stream: <name> FOUND` is infected. Anything
/// else, including `... ERROR`, has no verdict.
fn parse_response(response: &str) -> Result<Verdict, ScanError> {
    let response = response.trim();
    let body = response
        .split_once(':')
        .map(|(_, rest)| rest.trim())
        .unwrap_or(response);

    if body == "OK" {
        return Ok(Verdict::Clean);
    }

    if let Some(threat) = body.strip_suffix("FOUND") {
        let threat = threat.trim();
        let threat = if threat.is_empty() { "Unknown" } else { threat };
        return Ok(Verdict::infected(threat));
    }

    Err(ScanError::AmbiguousResponse {
        engine: ENGINE.to_string(),
        details: response.to_string(),
    })
}

#[async_trait]
impl ScanEngine for ClamAvEngine {
    fn name(&self) -> &str {
        ENGINE
    }

    async fn analyze(&self, data: ByteStream) -> Result<Verdict, ScanError> {
        let mut conn = self.connect().await?;
        let response = instream(&mut *conn, data).await?;

        tracing::debug!(engine = ENGINE, response = %response, "clamd replied");
        parse_response(&response)
    }

    async fn ping(&self) -> Result<(), ScanError> {
        let mut conn = self.connect().await?;
        conn.write_all(b"zPING\0").await.map_err(io_failed)?;
        conn.flush().await.map_err(io_failed)?;
        let response = read_reply(&mut *conn).await?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(ScanError::engine_unavailable(
                ENGINE,
                format!("unexpected ping response: {}", response),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BytesReader;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_response_clean() {
        assert_eq!(parse_response("stream: OK").unwrap(), Verdict::Clean);
    }

    #[test]
    fn test_parse_response_infected() {
        let verdict = parse_response("stream: Eicar-Test-Signature FOUND").unwrap();
        assert_eq!(verdict.threat(), Some("Eicar-Test-Signature"));
    }

    #[test]
    fn test_parse_response_error_is_not_a_verdict() {
        let err = parse_response("INSTREAM size limit exceeded. ERROR").unwrap_err();
        assert!(matches!(err, ScanError::AmbiguousResponse { .. }));
        assert!(err.is_recoverable());
        assert!(parse_response("").is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ClamAvConfig::new()
            .with_socket("/custom/path.sock")
            .with_connection_timeout(Duration::from_secs(2));

        assert_eq!(
            config.endpoint,
            ClamAvEndpoint::Socket(PathBuf::from("/custom/path.sock"))
        );
        assert_eq!(config.connection_timeout, Duration::from_secs(2));
        assert_eq!(
            ClamAvConfig::default().endpoint,
            ClamAvEndpoint::Tcp("127.0.0.1:3310".into())
        );
    }

    /// Accepts one connection, decodes an INSTREAM upload and answers.
    async fn fake_clamd(listener: TcpListener, reply: &'static str) -> Vec<u8> {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut command = [0u8; 10];
        socket.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"zINSTREAM\0");

        let mut received = Vec::new();
        loop {
            let len = socket.read_u32().await.unwrap() as usize;
            if len == 0 {
                break;
            }
            assert!(len <= CHUNK_SIZE);
            let mut chunk = vec![0u8; len];
            socket.read_exact(&mut chunk).await.unwrap();
            received.extend_from_slice(&chunk);
        }

        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.write_all(b"\0").await.unwrap();
        received
    }

    #[tokio::test]
    async fn test_analyze_streams_payload_in_chunks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(fake_clamd(listener, "stream: Eicar-Test-Signature FOUND"));

        let engine = ClamAvEngine::new(ClamAvConfig::new().with_tcp(addr.to_string())).unwrap();
        let payload = vec![9u8; 5000];
        let verdict = engine
            .analyze(BytesReader::new(payload.clone()).into_stream())
            .await
            .unwrap();

        assert!(verdict.is_infected());
        assert_eq!(server.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_ping_expects_pong() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut command = [0u8; 6];
            socket.read_exact(&mut command).await.unwrap();
            assert_eq!(&command, b"zPING\0");
            socket.write_all(b"PONG\0").await.unwrap();
        });

        let engine = ClamAvEngine::new(ClamAvConfig::new().with_tcp(addr.to_string())).unwrap();
        engine.ping().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_a_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let engine = ClamAvEngine::new(ClamAvConfig::new().with_tcp(addr.to_string())).unwrap();
        let err = engine.ping().await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
