//! Wire format for registry snapshots
//!
//! ```text
//! {"links":[{"A":"<HEX>","R":"<N.M>"}, ...]}
//! ```
//!
//! `A` is the short address in uppercase hex without padding, `R` the
//! filtered range as decimal text with a fixed number of decimals. Field order
//! is `A` then `R`; no whitespace is emitted.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::core::DEFAULT_WIRE_PRECISION;
use crate::processing::registry::LinkRecord;

/// Payload sent for an empty registry
pub const EMPTY_FRAME: &str = "{\"links\":[]}";

/// Largest accepted number of decimals for `R`
pub const MAX_PRECISION: usize = 6;

/// One element of the `links` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireLink {
    #[serde(rename = "A")]
    pub address: String,
    #[serde(rename = "R")]
    pub range: String,
}

/// Top-level wire object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub links: Vec<WireLink>,
}

/// Renders snapshots to the wire format
#[derive(Debug, Clone, Copy)]
pub struct LinkSerializer {
    precision: usize,
}

impl Default for LinkSerializer {
    fn default() -> Self {
        Self {
            precision: DEFAULT_WIRE_PRECISION,
        }
    }
}

impl LinkSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of decimals of `R`, capped at [`MAX_PRECISION`]
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision.min(MAX_PRECISION);
        self
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn frame(&self, snapshot: &[LinkRecord]) -> WireFrame {
        WireFrame {
            links: snapshot
                .iter()
                .map(|record| WireLink {
                    address: record.address.to_string(),
                    range: format!("{:.*}", self.precision, record.range_m),
                })
                .collect(),
        }
    }

    pub fn serialize(&self, snapshot: &[LinkRecord]) -> String {
        match serde_json::to_string(&self.frame(snapshot)) {
            Ok(text) => text,
            Err(err) => {
                // Only strings are serialized; this cannot fail in practice
                error!(%err, "failed to serialize link frame");
                EMPTY_FRAME.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ShortAddress;

    fn record(address: u16, range_m: f32) -> LinkRecord {
        LinkRecord {
            address: ShortAddress(address),
            range_m,
            signal_strength_dbm: -80.0,
        }
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(LinkSerializer::new().serialize(&[]), EMPTY_FRAME);
    }

    #[test]
    fn test_single_link() {
        let text = LinkSerializer::new().serialize(&[record(0xAAAA, 2.10)]);
        assert_eq!(text, "{\"links\":[{\"A\":\"AAAA\",\"R\":\"2.1\"}]}");
    }

    #[test]
    fn test_order_and_no_padding() {
        let text = LinkSerializer::new().serialize(&[record(0xBBBB, 3.46), record(0x0AB1, 0.0)]);
        assert_eq!(
            text,
            "{\"links\":[{\"A\":\"BBBB\",\"R\":\"3.5\"},{\"A\":\"AB1\",\"R\":\"0.0\"}]}"
        );
    }

    #[test]
    fn test_precision() {
        let serializer = LinkSerializer::new().with_precision(2);
        assert_eq!(
            serializer.serialize(&[record(0xAAA1, 2.5)]),
            "{\"links\":[{\"A\":\"AAA1\",\"R\":\"2.50\"}]}"
        );
        assert_eq!(LinkSerializer::new().with_precision(20).precision(), MAX_PRECISION);
    }

    #[test]
    fn test_frame_parses_back() {
        let serializer = LinkSerializer::new();
        let text = serializer.serialize(&[record(0xAAA1, 1.2), record(0xAAA2, 7.0)]);
        let frame: WireFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(frame, serializer.frame(&[record(0xAAA1, 1.2), record(0xAAA2, 7.0)]));
    }
}
