//! Session configuration.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Connection and credential configuration for a [`crate::session::Session`].
///
/// Deserializable so a host application can load it from its own config
/// file format; construct via [`Config::new`] rather than building the
/// struct literal directly so the PIN shape is validated eagerly.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub pin: String,
}

impl Config {
    /// Builds a `Config`, rejecting a PIN with zero digits before any I/O is
    /// attempted. A PIN with more than six digits is accepted here and
    /// truncated later by [`Config::pin_digits`].
    pub fn new(host: impl Into<String>, port: u16, pin: impl Into<String>) -> Result<Self> {
        let pin = pin.into();
        let digit_count = pin.chars().filter(char::is_ascii_digit).count();
        if digit_count == 0 {
            return Err(Error::InvalidPin);
        }

        Ok(Self {
            host: host.into(),
            port,
            pin,
        })
    }

    /// The PIN's ASCII digits, in order, truncated to the first six.
    pub(crate) fn pin_digits(&self) -> Vec<u8> {
        self.pin
            .chars()
            .filter(char::is_ascii_digit)
            .take(6)
            .map(|c| c as u8 - b'0')
            .collect()
    }
}
