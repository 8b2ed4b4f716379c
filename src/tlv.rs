//! TLV (type-length-value) codec for the data section of DATA and SYSTEM frames.
//!
//! ```text
//! u16 LE type | u8 length | length bytes of value
//! ```
//!
//! A record of type [`crate::constants::tlv_type::END`] terminates the
//! sequence and carries no length or value. Unknown types are tolerated —
//! the decoder returns them as opaque `(type, value)` pairs for the caller
//! to skip.

use crate::constants::tlv_type;
use crate::error::{Error, Result};

/// One decoded TLV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_type: u16,
    pub value: Vec<u8>,
}

/// Decode `payload` into an ordered sequence of records, stopping at the
/// `END` terminator (or the end of the slice if no terminator is present).
///
/// A declared length that runs past the end of `payload` is a
/// [`Error::TruncationError`] — the caller should still ACK the frame (see
/// `crate::dispatcher`) but discard whatever records were already decoded.
pub fn decode(payload: &[u8]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < payload.len() {
        if payload.len() - pos < 2 {
            return Err(Error::TruncationError);
        }
        let record_type = u16::from_le_bytes([payload[pos], payload[pos + 1]]);
        pos += 2;

        if record_type == tlv_type::END {
            break;
        }

        if pos >= payload.len() {
            return Err(Error::TruncationError);
        }
        let len = payload[pos] as usize;
        pos += 1;

        if payload.len() - pos < len {
            return Err(Error::TruncationError);
        }
        let value = payload[pos..pos + len].to_vec();
        pos += len;

        records.push(Record { record_type, value });
    }

    Ok(records)
}
