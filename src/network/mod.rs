//! Connection plumbing: the per-connection handle, the type-indexed
//! dispatch table, and the inbound decode pipeline.
//!
//! Each accepted socket becomes one read-loop task plus one writer task.
//! Connections share nothing inbound; the dispatch table and message
//! factory are immutable after startup and shared read-only.

pub mod connection;
pub mod dispatch;
pub mod pipeline;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

pub use connection::{Connection, ConnectionError};
pub use dispatch::{DispatchTable, DispatchTableBuilder};
pub use pipeline::{run_read_loop, InboundPipeline};

/// Splits an accepted stream and spawns its writer task.
///
/// Returns the connection handle plus the read half for
/// [`run_read_loop`]. The writer task raises the connection's
/// cancellation signal when the outbound side dies, so a write failure
/// also stops the read loop.
pub fn establish(stream: TcpStream, peer: SocketAddr) -> (Arc<Connection>, OwnedReadHalf) {
    let (read_half, write_half) = stream.into_split();
    let (conn, outbound_rx) = Connection::new(peer);
    let writer_conn = Arc::clone(&conn);
    tokio::spawn(async move {
        if let Err(e) = connection::run_writer(outbound_rx, write_half).await {
            tracing::debug!("[net] [writer_error] conn={} err={}", writer_conn.id(), e);
        }
        writer_conn.close();
    });
    (conn, read_half)
}
