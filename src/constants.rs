//! Protocol constants.
//!
//! Numeric assignments here come from two places: the worked scenarios in
//! the protocol description (packet types, TLV types, ACK/NACK shapes, known
//! error codes), and, where the description is silent, a documented
//! provisional choice (see `DESIGN.md` for the rationale — these are the
//! monitor item-kind numbers and the door/input/output/area state constants).

/// Magic prolog bytes every frame starts with.
pub const MAGIC: [u8; 2] = [b'I', b'C'];

/// Minimum valid frame length (prolog + length + type + format, no payload, no checksum).
pub const MIN_FRAME_LEN: u16 = 6;

/// Maximum valid frame length.
pub const MAX_FRAME_LEN: u16 = 1024;

/// Packet type byte values.
pub mod packet_type {
    /// Client → panel: command group + subcommand + parameters.
    pub const COMMAND: u8 = 0x00;
    /// Panel → client: one or more TLV status/event records. Must be ACKed.
    pub const DATA: u8 = 0x01;
    /// Bidirectional: ACK/NACK and low-level handshakes.
    pub const SYSTEM: u8 = 0xC0;
}

/// Format byte values (first byte of payload-adjacent metadata).
pub mod format {
    /// No encryption, no address byte, 8-bit sum checksum.
    pub const PLAIN: u8 = 0x00;
}

/// Checksum mode used by [`crate::frame::Framer::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    /// No trailing checksum byte(s).
    None,
    /// One trailing byte: `(sum of preceding bytes) mod 256`.
    Sum8,
    /// Two trailing bytes: CRC-16/CCITT-FALSE, little-endian.
    Crc16,
}

impl ChecksumMode {
    /// Number of trailing bytes this mode appends.
    pub const fn size(self) -> usize {
        match self {
            ChecksumMode::None => 0,
            ChecksumMode::Sum8 => 1,
            ChecksumMode::Crc16 => 2,
        }
    }
}

/// Command group bytes (first byte of a COMMAND payload).
///
/// `SYSTEM` is grounded directly in the worked login scenario (its payload
/// opens with the same byte as the `SYSTEM` packet type, `0xC0`). `DOOR`,
/// `OUTPUT`, and `INPUT` are grounded in `diagnose_protege_devices.py`'s
/// `test_device_query`, which hardcodes these exact group bytes per device
/// type. `AREA` has no worked example anywhere in the source under review;
/// it is assigned the one remaining small value provisionally pending
/// vendor confirmation. See `DESIGN.md`.
pub mod cmd_group {
    /// System-level commands (login, keepalive, monitoring, panel description).
    pub const SYSTEM: u8 = 0xC0;
    /// Door control commands.
    pub const DOOR: u8 = 0x01;
    /// Output control commands.
    pub const OUTPUT: u8 = 0x03;
    /// Input control commands.
    pub const INPUT: u8 = 0x04;
    /// Area control commands.
    pub const AREA: u8 = 0x02;
}

/// Subcommand bytes, scoped within their command group.
pub mod subcmd {
    // CMD_SYSTEM
    pub const ARE_YOU_THERE: u8 = 0x01;
    pub const LOGIN: u8 = 0x02;
    pub const LOGOUT: u8 = 0x03;
    pub const PANEL_DESCRIPTION: u8 = 0x04;
    pub const SET_LOGIN_TIME: u8 = 0x05;
    pub const ACK_CONFIG: u8 = 0x06;
    pub const REQUEST_EVENTS: u8 = 0x07;
    pub const REQUEST_TO_MONITOR: u8 = 0x08;

    // CMD_DOOR
    pub const LOCK_DOOR: u8 = 0x01;
    pub const UNLOCK_DOOR: u8 = 0x02;
    pub const UNLOCK_DOOR_LATCHED: u8 = 0x03;
    pub const REQUEST_DOOR_STATUS: u8 = 0x04;

    // CMD_OUTPUT
    pub const OUTPUT_ON: u8 = 0x01;
    pub const OUTPUT_OFF: u8 = 0x02;
    pub const OUTPUT_ON_TIMED: u8 = 0x03;
    pub const REQUEST_OUTPUT_STATUS: u8 = 0x04;

    // CMD_INPUT
    pub const REQUEST_INPUT_STATUS: u8 = 0x01;
    pub const BYPASS_INPUT_TEMP: u8 = 0x02;
    pub const BYPASS_INPUT_PERM: u8 = 0x03;
    pub const REMOVE_INPUT_BYPASS: u8 = 0x04;

    // CMD_AREA
    pub const ARM_NORMAL: u8 = 0x01;
    pub const ARM_FORCE: u8 = 0x02;
    pub const ARM_STAY: u8 = 0x03;
    pub const ARM_INSTANT: u8 = 0x04;
    pub const DISARM_AREA: u8 = 0x05;
    pub const DISARM_ALL: u8 = 0x06;
    pub const REQUEST_AREA_STATUS: u8 = 0x07;
}

/// Item-kind numbers used by `SYSTEM/REQUEST_TO_MONITOR`.
///
/// Not defined by the protocol description under review; provisionally
/// assigned the same sequential order as the TLV status types below
/// (door, input, output, area). See `DESIGN.md`.
pub mod monitor_kind {
    pub const DOOR: u16 = 0;
    pub const INPUT: u16 = 1;
    pub const OUTPUT: u16 = 2;
    pub const AREA: u16 = 3;
}

/// TLV record type values.
///
/// `DOOR_STATUS`, `OUTPUT_STATUS`, and `INPUT_STATUS` are grounded in
/// `diagnose_protege_devices.py`'s `analyze_packet`, which decodes these
/// exact type values (and follows the pattern `tlv_type == cmd_group << 8`
/// seen in `cmd_group` above). `AREA_STATUS` and `EVENT_READABLE` have no
/// worked example in the source under review and are assigned provisionally,
/// continuing the same pattern for `AREA_STATUS`. See `DESIGN.md`.
pub mod tlv_type {
    pub const PANEL_SERIAL: u16 = 0x0001;
    pub const FIRMWARE_TYPE: u16 = 0x0002;
    pub const FIRMWARE_VERSION: u16 = 0x0003;
    pub const FIRMWARE_BUILD: u16 = 0x0004;

    pub const DOOR_STATUS: u16 = 0x0100;
    pub const AREA_STATUS: u16 = 0x0200;
    pub const OUTPUT_STATUS: u16 = 0x0300;
    pub const INPUT_STATUS: u16 = 0x0400;

    pub const EVENT_READABLE: u16 = 0x0500;

    /// Terminates a TLV sequence; has no length or value.
    pub const END: u16 = 0xFFFF;
}

/// ACK_CONFIG payload requesting full acknowledgment of pushed data.
///
/// Opaque vendor blob; used verbatim. Sent once immediately after a
/// successful login.
pub const ACK_CONFIG_FULL: [u8; 8] = [0x01, 0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Session login timeout requested on the panel after a successful login.
pub const LOGIN_TIMEOUT_SECONDS: u16 = 600;

/// Known panel NACK error codes.
///
/// Non-exhaustive: callers should branch on the raw numeric code, this
/// module exists purely to give the well-known ones a name for logging.
pub mod error_code {
    pub const COMMAND_NOT_VALID: u16 = 0x0120;
    pub const INDEX_NOT_VALID: u16 = 0x0121;
    pub const INVALID_USER: u16 = 0x0302;
    pub const NO_ACCESS_RIGHTS: u16 = 0x0303;
    pub const ACCESS_DENIED_DEVICE: u16 = 0x030F;
    pub const AREA_NO_CHANGE: u16 = 0x0869;
    pub const DOOR_ALREADY_IN_STATE: u16 = 0x0A32;
}

/// Door, input, output, and area state byte constants.
///
/// Not defined by the protocol description beyond the worked example in
/// scenario S3 (`lock_state=1` observed as the locked value); the rest are
/// provisional, assigning `0` to the inactive/baseline state and `1` to the
/// active one. See `DESIGN.md`.
pub mod state {
    /// Door `lock_state` value meaning "locked".
    pub const DOOR_LOCKED: u8 = 1;
    /// Door `door_state` value meaning "closed".
    pub const DOOR_CLOSED: u8 = 0;
    /// Door `door_state` value meaning "forced open" (jammed).
    pub const DOOR_FORCED_OPEN: u8 = 4;

    /// Input `state` value meaning "open".
    pub const INPUT_OPEN: u8 = 1;

    /// Output `state` value meaning "off".
    pub const OUTPUT_OFF: u8 = 0;

    /// Area `state` value at and above which the area is considered armed.
    pub const AREA_ARMED: u8 = 1;
}

/// Seconds between keepalive probes while `Authenticated`.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Timeout for a single `call()` round trip.
pub const CALL_TIMEOUT_SECS: u64 = 5;

/// Timeout for the initial TCP connect.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for the post-connect "are you there" probe.
pub const PROBE_TIMEOUT_SECS: u64 = 3;

/// Depth of the bounded per-listener delivery queue. Overflow drops the
/// oldest queued item and logs a warning.
pub const LISTENER_QUEUE_DEPTH: usize = 64;
