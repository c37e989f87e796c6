//! MAC address type with safe parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// Accepts the three spellings found in switch tooling: colon separated,
/// hyphen separated, and a bare `0x` prefixed 48-bit integer.
///
/// # Examples
///
/// ```
/// use cheetah_types::MacAddress;
///
/// let mac: MacAddress = "b8:83:03:6f:43:49".parse().unwrap();
/// let raw: MacAddress = "0xb883036f4349".parse().unwrap();
/// assert_eq!(mac, raw);
/// assert_eq!(raw.to_string(), "b8:83:03:6f:43:49");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The zero/null MAC address (00:00:00:00:00:00).
    pub const ZERO: MacAddress = MacAddress([0, 0, 0, 0, 0, 0]);

    /// Largest value representable in 48 bits.
    const MAX_RAW: u64 = 0xffff_ffff_ffff;

    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Creates a MAC address from the low 48 bits of an integer.
    ///
    /// Fails if any of the upper 16 bits are set.
    pub fn from_u64(raw: u64) -> Result<Self, ParseError> {
        if raw > Self::MAX_RAW {
            return Err(ParseError::MacOutOfRange(raw));
        }
        let be = raw.to_be_bytes();
        Ok(MacAddress([be[2], be[3], be[4], be[5], be[6], be[7]]))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            if hex.is_empty() || hex.len() > 12 {
                return Err(invalid());
            }
            let raw = u64::from_str_radix(hex, 16).map_err(|_| invalid())?;
            return Self::from_u64(raw);
        }

        let separator = if s.contains(':') { ':' } else { '-' };
        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}
