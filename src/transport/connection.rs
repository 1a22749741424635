//! Connection identity, lifecycle tracking and message helpers.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track in-flight connections so shutdown can drain them
//! - Read and write single framed messages on a stream
//! - Open outbound connections for payload delivery

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::framing::{FrameDecoder, FrameStatus};
use super::TransportError;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks in-flight connections so shutdown can wait for them to finish.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has dropped its guard.
    pub async fn drained(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Guard for one connection's lifetime. Decrements the active count on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Read one framed message from the stream.
///
/// Buffers partial reads until a full document parses. A clean close before
/// that point is `ConnectionClosed`; bytes that can never parse are
/// `Malformed`.
pub async fn read_message<M, S>(stream: &mut S, max_frame_bytes: usize) -> Result<M, TransportError>
where
    M: serde::de::DeserializeOwned,
    S: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new(max_frame_bytes);
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        if let FrameStatus::Complete(message) = decoder.feed(&chunk[..n])? {
            return Ok(message);
        }
    }
}

/// Write one framed message to the stream and flush it.
pub async fn write_message<M, S>(stream: &mut S, message: &M) -> Result<(), TransportError>
where
    M: serde::Serialize,
    S: AsyncWrite + Unpin,
{
    let bytes = serde_json::to_vec(message).map_err(|e| TransportError::Malformed(e.to_string()))?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Connect to a peer, deliver one message and close the write side.
pub async fn send_message<M: serde::Serialize>(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    message: &M,
) -> Result<(), TransportError> {
    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {host}:{port} timed out"),
            ))
        })??;
    write_message(&mut stream, message).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        seq: u64,
    }

    #[test]
    fn connection_id_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);
        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn message_round_trip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(256);
        write_message(&mut client, &Ping { seq: 9 }).await.unwrap();
        let got: Ping = read_message(&mut server, 1024).await.unwrap();
        assert_eq!(got, Ping { seq: 9 });
    }

    #[tokio::test]
    async fn early_close_is_connection_closed() {
        let (client, mut server) = tokio::io::duplex(256);
        drop(client);
        let err = read_message::<Ping, _>(&mut server, 1024).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn close_mid_document_is_connection_closed() {
        let (mut client, mut server) = tokio::io::duplex(256);
        tokio::io::AsyncWriteExt::write_all(&mut client, br#"{"seq":"#)
            .await
            .unwrap();
        drop(client);
        let err = read_message::<Ping, _>(&mut server, 1024).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }
}
