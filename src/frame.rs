//! ACS frame codec.
//!
//! ```text
//! "IC" | u16 LE length | u8 packet type | u8 format | payload[...] | checksum
//! ```
//!
//! `length` counts the whole frame, prolog through checksum inclusive.
//! Decoding is asymmetric in a deliberate way: a bad magic or out-of-range
//! length is fatal for the stream (the caller should drop the connection),
//! while a checksum mismatch is reported as its own variant so the caller
//! can decide — in this crate both are treated as fatal, see
//! [`crate::reader`].

use crc::{Crc, CRC_16_IBM_3740};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::{format, ChecksumMode, MAGIC, MAX_FRAME_LEN, MIN_FRAME_LEN};
use crate::error::{Error, Result};

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection, no final XOR.
const CRC16_CCITT_FALSE: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Encode a frame with the given checksum mode.
///
/// Always writes format byte `0x00` (no encryption, no address byte) —
/// the only format this core speaks.
pub fn encode(packet_type: u8, payload: &[u8], checksum_mode: ChecksumMode) -> Vec<u8> {
    let total_len = MIN_FRAME_LEN as usize + payload.len() + checksum_mode.size();
    let mut buf = Vec::with_capacity(total_len);
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&(total_len as u16).to_le_bytes());
    buf.push(packet_type);
    buf.push(format::PLAIN);
    buf.extend_from_slice(payload);

    match checksum_mode {
        ChecksumMode::None => {}
        ChecksumMode::Sum8 => {
            let sum = sum8(&buf);
            buf.push(sum);
        }
        ChecksumMode::Crc16 => {
            let crc = CRC16_CCITT_FALSE.checksum(&buf);
            buf.extend_from_slice(&crc.to_le_bytes());
        }
    }

    buf
}

/// Read and decode one frame from `reader`.
///
/// Returns `(packet_type, payload)` with the checksum trailer already
/// validated and stripped. A bad magic, an out-of-range length, or a
/// checksum mismatch are all treated as fatal for the stream.
pub async fn decode<R: AsyncRead + Unpin>(
    reader: &mut R,
    checksum_mode: ChecksumMode,
) -> Result<(u8, Vec<u8>)> {
    let mut prolog = [0u8; 4];
    reader.read_exact(&mut prolog).await?;

    if prolog[0..2] != MAGIC {
        return Err(Error::FramingError(format!(
            "bad magic: {:02X?}, expected {:02X?}",
            &prolog[0..2],
            MAGIC
        )));
    }

    let total_len = u16::from_le_bytes([prolog[2], prolog[3]]);
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total_len) {
        return Err(Error::FramingError(format!(
            "length {total_len} out of range [{MIN_FRAME_LEN}, {MAX_FRAME_LEN}]"
        )));
    }

    let mut rest = vec![0u8; total_len as usize - 4];
    reader.read_exact(&mut rest).await?;

    let mut frame = Vec::with_capacity(total_len as usize);
    frame.extend_from_slice(&prolog);
    frame.extend_from_slice(&rest);

    let checksum_size = checksum_mode.size();
    let body_end = frame.len() - checksum_size;
    match checksum_mode {
        ChecksumMode::None => {}
        ChecksumMode::Sum8 => {
            let expected = frame[body_end];
            if sum8(&frame[..body_end]) != expected {
                return Err(Error::ChecksumError);
            }
        }
        ChecksumMode::Crc16 => {
            let expected = u16::from_le_bytes([frame[body_end], frame[body_end + 1]]);
            if CRC16_CCITT_FALSE.checksum(&frame[..body_end]) != expected {
                return Err(Error::ChecksumError);
            }
        }
    }

    let packet_type = frame[4];
    let payload = frame[6..body_end].to_vec();
    Ok((packet_type, payload))
}

fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_standard_test_vector() {
        assert_eq!(CRC16_CCITT_FALSE.checksum(b"123456789"), 0x29B1);
    }

    #[tokio::test]
    async fn round_trip_sum8() {
        let payload = vec![0xC0, 0x02, 0x01, 0x02, 0x03, 0xFF];
        let encoded = encode(0xC0, &payload, ChecksumMode::Sum8);
        let mut cursor = std::io::Cursor::new(encoded);
        let (packet_type, decoded_payload) =
            decode(&mut cursor, ChecksumMode::Sum8).await.unwrap();
        assert_eq!(packet_type, 0xC0);
        assert_eq!(decoded_payload, payload);
    }

    #[tokio::test]
    async fn round_trip_crc16() {
        let payload = b"hello panel".to_vec();
        let encoded = encode(0x01, &payload, ChecksumMode::Crc16);
        let mut cursor = std::io::Cursor::new(encoded);
        let (packet_type, decoded_payload) =
            decode(&mut cursor, ChecksumMode::Crc16).await.unwrap();
        assert_eq!(packet_type, 0x01);
        assert_eq!(decoded_payload, payload);
    }

    #[tokio::test]
    async fn round_trip_no_checksum() {
        let payload = vec![1, 2, 3];
        let encoded = encode(0x00, &payload, ChecksumMode::None);
        let mut cursor = std::io::Cursor::new(encoded);
        let (packet_type, decoded_payload) =
            decode(&mut cursor, ChecksumMode::None).await.unwrap();
        assert_eq!(packet_type, 0x00);
        assert_eq!(decoded_payload, payload);
    }

    #[tokio::test]
    async fn bad_magic_is_framing_error() {
        let mut bytes = encode(0xC0, &[1, 2, 3], ChecksumMode::Sum8);
        bytes[0] = b'X';
        let mut cursor = std::io::Cursor::new(bytes);
        let err = decode(&mut cursor, ChecksumMode::Sum8).await.unwrap_err();
        assert!(matches!(err, Error::FramingError(_)));
    }

    #[tokio::test]
    async fn corrupted_checksum_is_detected() {
        let mut bytes = encode(0xC0, &[1, 2, 3, 4], ChecksumMode::Sum8);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut cursor = std::io::Cursor::new(bytes);
        let err = decode(&mut cursor, ChecksumMode::Sum8).await.unwrap_err();
        assert!(matches!(err, Error::ChecksumError));
    }

    #[tokio::test]
    async fn length_below_minimum_is_framing_error() {
        let mut bytes = encode(0xC0, &[], ChecksumMode::None);
        bytes[2] = 2;
        bytes[3] = 0;
        let mut cursor = std::io::Cursor::new(bytes);
        let err = decode(&mut cursor, ChecksumMode::None).await.unwrap_err();
        assert!(matches!(err, Error::FramingError(_)));
    }

    #[test]
    fn encoded_length_field_covers_whole_frame() {
        let payload = vec![0xC0, 0x02, 0x01, 0x02, 0x03, 0x04, 0xFF];
        let encoded = encode(0x00, &payload, ChecksumMode::Sum8);
        let declared_len = u16::from_le_bytes([encoded[2], encoded[3]]);
        assert_eq!(declared_len as usize, encoded.len());
        assert_eq!(&encoded[0..2], &MAGIC);
        assert_eq!(encoded[4], 0x00);
        assert_eq!(encoded[5], format::PLAIN);
    }
}
