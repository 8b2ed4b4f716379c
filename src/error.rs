//! Crate-wide error taxonomy.
//!
//! Every fallible operation in this crate returns [`Result<T>`], built on a
//! single [`Error`] enum. Callers are expected to match on specific variants
//! (particularly [`Error::PanelError`] and [`Error::AuthenticationFailed`],
//! whose `code` carries panel-specific meaning) rather than treat every
//! failure the same way.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while talking to a Protege panel over ACS.
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connect failed or exceeded the connect timeout.
    #[error("failed to connect to panel: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Bad magic bytes or an out-of-range length in a frame header.
    #[error("framing error: {0}")]
    FramingError(String),

    /// Checksum over a received frame did not match its trailer.
    #[error("checksum mismatch")]
    ChecksumError,

    /// A TLV record's declared length exceeds the bytes remaining in the frame.
    #[error("truncated TLV payload")]
    TruncationError,

    /// No response arrived within the 5 second command timeout.
    #[error("timed out waiting for panel response")]
    Timeout,

    /// The panel returned a NACK for a command.
    #[error("panel rejected command with error code 0x{code:04X}")]
    PanelError {
        /// The 16-bit error code from the NACK payload.
        code: u16,
    },

    /// A command was attempted before the session reached `Authenticated`.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The packet reader task terminated (EOF, framing error, or I/O error).
    #[error("connection lost")]
    ConnectionLost,

    /// Login was rejected because of an invalid PIN or insufficient access.
    #[error("authentication failed with error code 0x{code:04X}")]
    AuthenticationFailed {
        /// The 16-bit error code from the login NACK payload.
        code: u16,
    },

    /// `login()` was called with a PIN that contains no digits.
    #[error("PIN must contain between 1 and 6 digits")]
    InvalidPin,

    /// Low-level I/O error not otherwise classified above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
