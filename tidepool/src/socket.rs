//! Per-connection socket abstraction.
//!
//! Each accepted connection is wrapped in a [`TcpSocket`]: a reader task
//! pumps inbound bytes into an unbounded FIFO chunk queue, and a writer task
//! drains an outbound queue into the transport. The consumer-facing contract
//! is blocking-receive / non-blocking-write:
//!
//! ```text
//! transport read half ──► reader task ──► chunk queue ──► receive().await
//! transport write half ◄── writer task ◄── outbound queue ◄── write(bytes)
//! ```
//!
//! Closing the socket (locally or by the peer) closes the chunk queue:
//! buffered chunks remain receivable, after which `receive` fails with
//! [`SocketError::ConnectionClosed`]. A receive pending on an empty queue is
//! woken with that error instead of hanging.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SocketError;

/// Read buffer size for the inbound pump. Chunk boundaries are whatever the
/// transport delivers per read, not message boundaries.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// One live connection, exposed as an ordered byte-chunk stream.
#[async_trait]
pub trait Socket: Send + Sync {
    /// Remove and return the oldest queued chunk, in arrival order.
    ///
    /// Suspends while the queue is empty. Once the connection is closed and
    /// the queue drained, fails with [`SocketError::ConnectionClosed`]
    /// instead of suspending forever.
    async fn receive(&self) -> Result<Vec<u8>, SocketError>;

    /// Submit bytes for transmission to the peer.
    ///
    /// Returns whether the transport accepted the bytes into its buffer.
    /// Acceptance does not guarantee delivery, and no backpressure is
    /// applied. Returns `false` once the socket is closed.
    fn write(&self, data: &[u8]) -> bool;

    /// Forcibly terminate the connection.
    ///
    /// Already-buffered inbound chunks remain receivable; any pending or
    /// later `receive` then fails with [`SocketError::ConnectionClosed`].
    /// Queued outbound bytes are not flushed.
    fn close(&self);
}

/// [`Socket`] backed by a tokio [`TcpStream`].
pub struct TcpSocket {
    /// Consumer end of the inbound chunk queue. The producer end lives in
    /// the reader task; dropping it closes the queue.
    chunks: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: AtomicBool,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl TcpSocket {
    /// Wrap an accepted connection, spawning its reader and writer tasks.
    pub(crate) fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(pump_inbound(read_half, chunk_tx));
        let writer = tokio::spawn(pump_outbound(outbound_rx, write_half));

        Self {
            chunks: tokio::sync::Mutex::new(chunk_rx),
            outbound: outbound_tx,
            closed: AtomicBool::new(false),
            reader,
            writer,
        }
    }
}

#[async_trait]
impl Socket for TcpSocket {
    async fn receive(&self) -> Result<Vec<u8>, SocketError> {
        self.chunks
            .lock()
            .await
            .recv()
            .await
            .ok_or(SocketError::ConnectionClosed)
    }

    fn write(&self, data: &[u8]) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.outbound.send(data.to_vec()).is_ok()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Aborting the reader drops the producer end of the chunk queue,
        // which wakes any pending receive with ConnectionClosed.
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for TcpSocket {
    fn drop(&mut self) {
        // Dropping a socket always closes it, matching real TCP behavior.
        self.reader.abort();
        self.writer.abort();
    }
}

/// Pump transport reads into the chunk queue until EOF, error, or abort.
async fn pump_inbound(mut read_half: OwnedReadHalf, chunks: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        match read_half.read(&mut buffer).await {
            Ok(0) => {
                tracing::debug!("peer closed the connection");
                break;
            }
            Ok(n) => {
                tracing::trace!("received chunk of {} bytes", n);
                // Fails only if the consumer side is gone; nothing to do then.
                if chunks.send(buffer[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(error) => {
                tracing::debug!("socket read failed: {}", error);
                break;
            }
        }
    }
    // The producer drops here, closing the queue after buffered chunks.
}

/// Pump queued writes into the transport until close or error.
async fn pump_outbound(
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    mut write_half: OwnedWriteHalf,
) {
    while let Some(data) = outbound.recv().await {
        if let Err(error) = write_half.write_all(&data).await {
            tracing::debug!("socket write failed: {}", error);
            break;
        }
    }
}
