//! The Packet Reader background task.
//!
//! Pulls frames off the socket for the life of the connection and routes
//! them by packet type. Never awaits a response — it only pushes, so a
//! slow or absent caller on the multiplexer side can never deadlock the
//! flow of pushed `DATA` frames and their mandatory ACKs.

use std::sync::Arc;

use log::{debug, error, warn};
use tokio::io::ReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::constants::{packet_type, ChecksumMode};
use crate::dispatcher::Dispatcher;
use crate::frame;
use crate::send_gate::SendGate;

/// A raw response frame forwarded to the multiplexer: `(packet_type, payload)`.
pub type ResponseFrame = (u8, Vec<u8>);

/// Spawns the Packet Reader over `read_half`.
///
/// Returns a receiver fed with every `SYSTEM` or unexpected `COMMAND` frame
/// (the multiplexer's response channel) and the task's `JoinHandle`. The
/// channel closes when the task exits, which is how the multiplexer learns
/// the connection was lost. `on_terminate` runs once, only when the loop
/// exits on its own (EOF, decode error, or a closed send gate) — not when
/// the task is cancelled by the owner during a graceful shutdown.
pub fn spawn(
    mut read_half: ReadHalf<TcpStream>,
    checksum_mode: ChecksumMode,
    dispatcher: Arc<Dispatcher>,
    send_gate: SendGate,
    on_terminate: impl FnOnce() + Send + 'static,
) -> (mpsc::UnboundedReceiver<ResponseFrame>, JoinHandle<()>) {
    let (response_tx, response_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        loop {
            match frame::decode(&mut read_half, checksum_mode).await {
                Ok((pt, payload)) if pt == packet_type::SYSTEM || pt == packet_type::COMMAND => {
                    if pt == packet_type::COMMAND {
                        debug!("received unexpected COMMAND packet, forwarding to multiplexer");
                    }
                    if response_tx.send((pt, payload)).is_err() {
                        break;
                    }
                }
                Ok((pt, payload)) if pt == packet_type::DATA => {
                    dispatcher.handle_data_frame(&payload);
                    let ack = frame::encode(packet_type::SYSTEM, &[0xFF, 0x00], checksum_mode);
                    if !send_gate.send(ack) {
                        warn!("send gate closed while transmitting DATA ack");
                        break;
                    }
                }
                Ok((pt, _)) => {
                    warn!("ignoring frame with unrecognized packet type 0x{pt:02X}");
                }
                Err(e) => {
                    error!("packet reader terminating: {e}");
                    break;
                }
            }
        }
        debug!("packet reader stopped");
        on_terminate();
    });

    (response_rx, task)
}
