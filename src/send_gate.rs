//! The single outbound-byte ordering point shared by the multiplexer,
//! dispatcher, and keepalive task.
//!
//! Grounded in the write-task-plus-channel idiom used for socket writers
//! elsewhere in this codebase: a dedicated task owns the socket's write
//! half and drains an unbounded channel, so every caller that holds a
//! [`SendGate`] clone gets FIFO delivery without needing its own lock
//! around the socket.

use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use log::{debug, warn};

/// A cloneable handle that enqueues whole encoded frames for transmission,
/// in the order enqueued, across every holder.
#[derive(Debug, Clone)]
pub struct SendGate {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl SendGate {
    /// Spawns the writer task over `write_half` and returns a handle plus
    /// its `JoinHandle` (so the owner can await clean shutdown).
    pub fn spawn(write_half: WriteHalf<TcpStream>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(writer_loop(write_half, rx));
        (Self { tx }, task)
    }

    /// Enqueue a pre-encoded frame for transmission. Returns `false` if the
    /// writer task has already exited (connection lost).
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.tx.send(frame).is_ok()
    }
}

async fn writer_loop(mut write_half: WriteHalf<TcpStream>, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        debug!("writing {} bytes", frame.len());
        if let Err(e) = write_half.write_all(&frame).await {
            warn!("send gate write failed, closing: {e}");
            break;
        }
    }
}
