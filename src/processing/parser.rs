//! Decoder for link frames arriving on the host side of the TCP stream
//!
//! The tag writes one `{"links":[...]}` object per report tick with no
//! delimiter, so a read may carry a partial frame, exactly one, or several.
//! Only the newest complete frame is of interest; older ones are discarded.

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::formatting::{WireFrame, WireLink};
use crate::core::ShortAddress;

const FRAME_START: &str = "{\"links\":";
const FRAME_END: &str = "]}";

/// Cap on text kept while waiting for a frame to complete
pub const MAX_BUFFERED_BYTES: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed link frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid anchor address in frame: '{0}'")]
    InvalidAddress(String),

    #[error("Invalid range value in frame: '{0}'")]
    InvalidRange(String),
}

/// One entry of a received frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedLink {
    pub address: ShortAddress,
    pub range_m: f32,
}

impl TryFrom<&WireLink> for DecodedLink {
    type Error = FrameError;

    fn try_from(link: &WireLink) -> Result<Self, Self::Error> {
        let address = ShortAddress::from_hex(&link.address)
            .map_err(|_| FrameError::InvalidAddress(link.address.clone()))?;
        let range_m = link
            .range
            .trim()
            .parse::<f32>()
            .map_err(|_| FrameError::InvalidRange(link.range.clone()))?;
        Ok(Self { address, range_m })
    }
}

/// Streaming decoder keeping unconsumed text between reads
#[derive(Debug, Default)]
pub struct LinkFrameDecoder {
    buffer: String,
    frames_decoded: u64,
    frames_skipped: u64,
}

impl LinkFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received text and decode the newest complete frame, if any.
    ///
    /// Text up to the end of that frame is consumed even when decoding fails,
    /// so one bad frame never blocks the stream.
    pub fn push(&mut self, chunk: &str) -> Result<Option<Vec<DecodedLink>>, FrameError> {
        self.buffer.push_str(chunk);

        let Some((start, end)) = self.last_complete_frame() else {
            self.trim_stale();
            return Ok(None);
        };

        let frame_text = self.buffer[start..end].to_string();
        self.buffer.drain(..end);

        let frame: WireFrame = serde_json::from_str(&frame_text)?;
        let links = frame
            .links
            .iter()
            .map(DecodedLink::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        self.frames_decoded += 1;
        debug!(links = links.len(), "link frame decoded");
        Ok(Some(links))
    }

    /// Text received but not yet part of a complete frame
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Complete frames superseded by a newer one in the same read
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    fn last_complete_frame(&mut self) -> Option<(usize, usize)> {
        let mut cursor = 0;
        let mut last = None;
        while let Some(rel_start) = self.buffer[cursor..].find(FRAME_START) {
            let start = cursor + rel_start;
            let body = start + FRAME_START.len();
            let Some(rel_end) = self.buffer[body..].find(FRAME_END) else {
                break;
            };
            let end = body + rel_end + FRAME_END.len();
            if last.is_some() {
                self.frames_skipped += 1;
            }
            last = Some((start, end));
            cursor = end;
        }
        last
    }

    fn trim_stale(&mut self) {
        if self.buffer.len() <= MAX_BUFFERED_BYTES {
            return;
        }
        // Keep the most recent frame start, drop everything before it. An
        // unterminated frame that alone exceeds the cap is dropped as well.
        let keep_from = match self.buffer.rfind(FRAME_START) {
            Some(start) if self.buffer.len() - start <= MAX_BUFFERED_BYTES => start,
            _ => self.buffer.len(),
        };
        warn!(dropped = keep_from, "link buffer overflow, discarding stale text");
        self.buffer.drain(..keep_from);
    }
}
