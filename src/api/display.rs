//! Display adapter
//!
//! The display shows one row per anchor, in registry order, or a single
//! "No Anchor" message when nothing is registered. Frames are built from the
//! same snapshot the serializer uses for the network payload.

use std::io::Write;

use crate::core::HardwareAddress;
use crate::hardware::engine::DeviceRole;
use crate::hardware::error::{HardwareError, HardwareResult};
use crate::processing::registry::LinkRecord;

/// Text shown when the registry is empty
pub const NO_ANCHOR_TEXT: &str = "No Anchor";

/// One anchor line on the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    /// Four-digit zero-padded hex address
    pub address: String,
    /// Filtered range with two decimals and unit, e.g. `"2.10 m"`
    pub range: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayFrame {
    NoAnchors,
    Rows(Vec<DisplayRow>),
}

impl DisplayFrame {
    pub fn from_snapshot(snapshot: &[LinkRecord]) -> Self {
        if snapshot.is_empty() {
            return DisplayFrame::NoAnchors;
        }
        DisplayFrame::Rows(
            snapshot
                .iter()
                .map(|record| DisplayRow {
                    address: record.address.padded_hex(),
                    range: format!("{:.2} m", record.range_m),
                })
                .collect(),
        )
    }

    /// Text lines in display order
    pub fn lines(&self) -> Vec<String> {
        match self {
            DisplayFrame::NoAnchors => vec![NO_ANCHOR_TEXT.to_string()],
            DisplayFrame::Rows(rows) => rows
                .iter()
                .map(|row| format!("{} : {}", row.address, row.range))
                .collect(),
        }
    }
}

/// Output device for anchor rows
pub trait DisplayAdapter {
    /// Bring the panel up. Failure here is fatal for the device.
    fn init(&mut self) -> HardwareResult<()>;

    /// Start-up screen naming the role, plus the address for anchors
    fn splash(&mut self, role: DeviceRole, address: &HardwareAddress) -> HardwareResult<()>;

    fn render(&mut self, frame: &DisplayFrame) -> HardwareResult<()>;
}

/// Line-oriented display writing to any [`Write`] sink
pub struct TextDisplay<W: Write> {
    out: W,
    initialized: bool,
}

impl<W: Write> TextDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            initialized: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_lines(&mut self, lines: &[String]) -> std::io::Result<()> {
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> DisplayAdapter for TextDisplay<W> {
    fn init(&mut self) -> HardwareResult<()> {
        self.out.flush().map_err(|e| HardwareError::DisplayInit {
            reason: e.to_string(),
        })?;
        self.initialized = true;
        Ok(())
    }

    fn splash(&mut self, role: DeviceRole, address: &HardwareAddress) -> HardwareResult<()> {
        let mut lines = vec!["UWB Link".to_string(), role.to_string()];
        if role == DeviceRole::Anchor {
            lines.push(address.to_string());
        }
        self.write_lines(&lines).map_err(|e| HardwareError::DisplayWrite {
            reason: e.to_string(),
        })
    }

    fn render(&mut self, frame: &DisplayFrame) -> HardwareResult<()> {
        if !self.initialized {
            return Err(HardwareError::DisplayWrite {
                reason: "display not initialized".to_string(),
            });
        }
        self.write_lines(&frame.lines()).map_err(|e| HardwareError::DisplayWrite {
            reason: e.to_string(),
        })
    }
}
