//! Per-connection handle shared between the read loop and handlers.
//!
//! The read loop owns the inbound side; handlers only ever see this
//! handle, which exposes the outbound queue and the connection's single
//! cancellation signal. Outbound bytes are drained to the socket by a
//! dedicated writer task, so a slow peer backpressures through the
//! bounded queue instead of blocking handlers on the socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use crate::protocol::{frame, Message, ProtocolError};

/// Outbound frames queued per connection before `send` suspends.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

static NEXT_CONNECTION_ID: AtomicU32 = AtomicU32::new(1);

/// Errors surfaced by the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection {id} is closed")]
    Closed { id: u32 },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One live client connection.
pub struct Connection {
    id: u32,
    peer: SocketAddr,
    outbound: mpsc::Sender<Vec<u8>>,
    cancel: watch::Sender<bool>,
    unknown_frames: AtomicU64,
}

impl Connection {
    /// Allocates a connection handle and the receiving end of its
    /// outbound queue (hand that to [`run_writer`]).
    pub fn new(peer: SocketAddr) -> (Arc<Self>, mpsc::Receiver<Vec<u8>>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let (cancel, _) = watch::channel(false);
        let conn = Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            outbound,
            cancel,
            unknown_frames: AtomicU64::new(0),
        });
        (conn, rx)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Frames `message` and queues it for the writer task. Suspends when
    /// the queue is full; fails once the connection is closed.
    pub async fn send(&self, message: &dyn Message) -> Result<(), ConnectionError> {
        let bytes = frame::encode(message)?;
        tracing::trace!(
            "[net] [packet_out] conn={} id={} name={} len={}",
            self.id,
            message.protocol_id(),
            message.message_name(),
            bytes.len()
        );
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| ConnectionError::Closed { id: self.id })
    }

    /// Raises the cancellation signal. Idempotent; the read loop and any
    /// handler watching [`closed`](Self::closed) stop promptly.
    pub fn close(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        let mut rx = self.cancel.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Bumps and returns the count of frames with unregistered ids seen
    /// on this connection.
    pub fn note_unknown_frame(&self) -> u64 {
        self.unknown_frames.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Drains one connection's outbound queue into the transport.
///
/// Runs as its own task; ends when every queue sender is gone or the
/// socket errors.
pub async fn run_writer<W>(mut rx: mpsc::Receiver<Vec<u8>>, mut writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = rx.recv().await {
        writer.write_all(&bytes).await?;
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::game::HeartbeatMessage;

    fn test_peer() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    #[tokio::test]
    async fn test_send_queues_encoded_frame() {
        let (conn, mut rx) = Connection::new(test_peer());
        conn.send(&HeartbeatMessage).await.unwrap();
        let bytes = rx.recv().await.unwrap();
        assert_eq!(bytes, (182u16 << 2).to_be_bytes());
    }

    #[tokio::test]
    async fn test_send_after_queue_dropped_is_closed_error() {
        let (conn, rx) = Connection::new(test_peer());
        drop(rx);
        let err = conn.send(&HeartbeatMessage).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Closed { .. }));
    }

    #[tokio::test]
    async fn test_close_resolves_waiters() {
        let (conn, _rx) = Connection::new(test_peer());
        assert!(!conn.is_closed());

        let waiter = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.closed().await })
        };
        conn.close();
        waiter.await.unwrap();
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_connection_ids_are_distinct() {
        let (a, _ra) = Connection::new(test_peer());
        let (b, _rb) = Connection::new(test_peer());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_writer_drains_queue_in_order() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(vec![1, 2]).await.unwrap();
        tx.send(vec![3]).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        run_writer(rx, &mut out).await.unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }
}
