//! Inbound decode pipeline: one per connection.
//!
//! Transport reads arrive at arbitrary fragment boundaries, so the
//! pipeline keeps a retained buffer of bytes that have been examined but
//! not yet consumed. Every `feed` appends the new bytes and then drains
//! as many complete frames as the buffer holds, dispatching each one —
//! and awaiting its handler — before looking at the next. That await is
//! the per-connection ordering guarantee: handlers on one connection
//! never run concurrently with each other.
//!
//! An id without a factory registration is skipped in full and logged;
//! a body that fails to deserialize ends the connection, because frame
//! boundaries cannot be trusted past it.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::connection::{Connection, ConnectionError};
use super::dispatch::DispatchTable;
use crate::protocol::factory::MessageFactory;
use crate::protocol::frame::{self, DecodeOutcome};

/// Transport read chunk size.
const READ_CHUNK: usize = 4096;

/// How many bytes of an unknown frame's head end up hex-dumped in the log.
const UNKNOWN_DUMP_LEN: usize = 16;

/// Retained-buffer decoder for a single connection.
pub struct InboundPipeline {
    factory: Arc<MessageFactory>,
    table: Arc<DispatchTable>,
    buf: BytesMut,
}

impl InboundPipeline {
    pub fn new(factory: Arc<MessageFactory>, table: Arc<DispatchTable>) -> Self {
        Self {
            factory,
            table,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Bytes examined but not yet consumed (a partial frame in flight).
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Appends freshly read bytes, then decodes and dispatches every
    /// complete frame now in the buffer, in order.
    pub async fn feed(
        &mut self,
        conn: &Arc<Connection>,
        bytes: &[u8],
    ) -> Result<(), ConnectionError> {
        self.buf.extend_from_slice(bytes);
        loop {
            if conn.is_closed() {
                return Ok(());
            }
            match frame::decode(&self.buf, &self.factory)? {
                DecodeOutcome::NeedMoreData => return Ok(()),
                DecodeOutcome::Frame { consumed, message } => {
                    tracing::debug!(
                        "[net] [packet_in] conn={} id={} name={} len={}",
                        conn.id(),
                        message.protocol_id(),
                        message.message_name(),
                        consumed
                    );
                    self.buf.advance(consumed);
                    self.table.dispatch(Arc::clone(conn), message).await;
                }
                DecodeOutcome::Unknown {
                    consumed,
                    id,
                    body_len,
                } => {
                    let seen = conn.note_unknown_frame();
                    let head = &self.buf[..consumed.min(UNKNOWN_DUMP_LEN)];
                    tracing::warn!(
                        "[net] [unknown_message] conn={} id={} body_len={} seen={} head={}",
                        conn.id(),
                        id,
                        body_len,
                        seen,
                        hex::encode(head)
                    );
                    self.buf.advance(consumed);
                }
            }
        }
    }
}

/// Runs a connection's read loop to completion.
///
/// Ends cleanly when the peer closes the stream or the connection's
/// cancellation signal fires — bytes of a partial frame still retained at
/// that point are discarded without error, a peer closing mid-frame is
/// only an incomplete session. Ends with an error on transport failure
/// or a malformed body.
pub async fn run_read_loop<R>(
    mut reader: R,
    conn: Arc<Connection>,
    mut pipeline: InboundPipeline,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        tokio::select! {
            _ = conn.closed() => return Ok(()),
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    if pipeline.pending() > 0 {
                        tracing::debug!(
                            "[net] [eof_mid_frame] conn={} discarded={}",
                            conn.id(),
                            pipeline.pending()
                        );
                    }
                    return Ok(());
                }
                Ok(n) => pipeline.feed(&conn, &chunk[..n]).await?,
                Err(e) => return Err(e.into()),
            },
        }
    }
}
