//! Device addressing types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LinkError;

/// Compact 16-bit identifier carried by every ranging event.
///
/// `0` is reserved and never identifies a real device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShortAddress(pub u16);

impl ShortAddress {
    /// The reserved invalid address
    pub const INVALID: ShortAddress = ShortAddress(0);

    pub fn new(raw: u16) -> Self {
        ShortAddress(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Parse an unpadded or padded hex string such as `"AAA1"` or `"1f"`
    pub fn from_hex(text: &str) -> Result<Self, LinkError> {
        let trimmed = text.trim();
        // from_str_radix alone would also take a leading '+'
        if trimmed.is_empty() || trimmed.len() > 4 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LinkError::InvalidShortAddress(text.to_string()));
        }
        u16::from_str_radix(trimmed, 16)
            .map(ShortAddress)
            .map_err(|_| LinkError::InvalidShortAddress(text.to_string()))
    }

    /// Four-digit zero-padded form used on the display
    pub fn padded_hex(self) -> String {
        format!("{:04X}", self.0)
    }
}

/// Uppercase hex without leading zero padding, as sent on the wire
impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl From<u16> for ShortAddress {
    fn from(raw: u16) -> Self {
        ShortAddress(raw)
    }
}

/// Full 64-bit radio identity, written as eight colon-separated hex bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress([u8; 8]);

impl HardwareAddress {
    pub fn new(bytes: [u8; 8]) -> Self {
        HardwareAddress(bytes)
    }

    pub fn bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The ranging engine addresses peers by the first two bytes, little-endian.
    pub fn short_address(&self) -> ShortAddress {
        ShortAddress(u16::from_le_bytes([self.0[0], self.0[1]]))
    }
}

impl FromStr for HardwareAddress {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 8];
        let mut count = 0;
        for part in s.trim().split(':') {
            if count == bytes.len() || part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(LinkError::InvalidHardwareAddress(s.to_string()));
            }
            bytes[count] = u8::from_str_radix(part, 16)
                .map_err(|_| LinkError::InvalidHardwareAddress(s.to_string()))?;
            count += 1;
        }
        if count != bytes.len() {
            return Err(LinkError::InvalidHardwareAddress(s.to_string()));
        }
        Ok(HardwareAddress(bytes))
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for HardwareAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HardwareAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
