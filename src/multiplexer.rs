//! Request/response multiplexing over a connection with no correlation ID.
//!
//! The protocol allows at most one outstanding command at a time. `call`
//! enforces that with an async mutex around the whole round trip: acquire,
//! drain anything stale left over from a previous timed-out call, send,
//! await the next response with a timeout, release.

use std::time::Duration;

use log::debug;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::constants::{packet_type, ChecksumMode, CALL_TIMEOUT_SECS};
use crate::error::{Error, Result};
use crate::frame;
use crate::reader::ResponseFrame;
use crate::send_gate::SendGate;

/// The panel's reply to a transmitted `COMMAND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    /// `SYSTEM` payload `[0xFF, 0x00]`.
    Ack,
    /// `SYSTEM` payload `[0xFF, 0xFF, code_lo, code_hi]`.
    Nack(u16),
    /// Any other `SYSTEM` payload — a TLV-encoded reply such as a status
    /// query result or the panel description.
    Data(Vec<u8>),
}

/// Serializes outbound commands and matches each to the next response.
pub struct Multiplexer {
    send_gate: SendGate,
    checksum_mode: ChecksumMode,
    response_rx: Mutex<mpsc::UnboundedReceiver<ResponseFrame>>,
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("checksum_mode", &self.checksum_mode)
            .finish_non_exhaustive()
    }
}

impl Multiplexer {
    pub fn new(
        send_gate: SendGate,
        checksum_mode: ChecksumMode,
        response_rx: mpsc::UnboundedReceiver<ResponseFrame>,
    ) -> Self {
        Self {
            send_gate,
            checksum_mode,
            response_rx: Mutex::new(response_rx),
        }
    }

    /// Send a `COMMAND` frame built from `cmd_group | subcmd | params` and
    /// await its response within the standard 5-second call timeout,
    /// enforcing the single-in-flight-command invariant.
    pub async fn call(&self, cmd_group: u8, subcmd: u8, params: &[u8]) -> Result<CommandResponse> {
        self.call_with_timeout(cmd_group, subcmd, params, Duration::from_secs(CALL_TIMEOUT_SECS))
            .await
    }

    /// As [`Multiplexer::call`], but with an explicit timeout — used for
    /// the shorter post-connect "are you there" probe.
    pub async fn call_with_timeout(
        &self,
        cmd_group: u8,
        subcmd: u8,
        params: &[u8],
        call_timeout: Duration,
    ) -> Result<CommandResponse> {
        let mut rx = self.response_rx.lock().await;

        let mut drained = 0u32;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            debug!("drained {drained} stale response frame(s) before new call");
        }

        let mut payload = Vec::with_capacity(2 + params.len());
        payload.push(cmd_group);
        payload.push(subcmd);
        payload.extend_from_slice(params);
        let encoded = frame::encode(packet_type::COMMAND, &payload, self.checksum_mode);

        if !self.send_gate.send(encoded) {
            return Err(Error::ConnectionLost);
        }

        match timeout(call_timeout, rx.recv()).await {
            Ok(Some((_pt, payload))) => Ok(classify(&payload)),
            Ok(None) => Err(Error::ConnectionLost),
            Err(_elapsed) => Err(Error::Timeout),
        }
    }

    /// Fire-and-forget write through the same send gate, used by the
    /// keepalive task. Does not take the call gate: it never awaits a
    /// response.
    pub fn send_fire_and_forget(&self, cmd_group: u8, subcmd: u8) -> bool {
        let payload = vec![cmd_group, subcmd];
        let encoded = frame::encode(packet_type::COMMAND, &payload, self.checksum_mode);
        self.send_gate.send(encoded)
    }
}

fn classify(payload: &[u8]) -> CommandResponse {
    if payload.len() == 2 && payload[0] == 0xFF && payload[1] == 0x00 {
        return CommandResponse::Ack;
    }
    if payload.len() >= 4 && payload[0] == 0xFF && payload[1] == 0xFF {
        let code = u16::from_le_bytes([payload[2], payload[3]]);
        return CommandResponse::Nack(code);
    }
    CommandResponse::Data(payload.to_vec())
}
