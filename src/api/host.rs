//! Host side of the link: decoded frames in, tag fixes out

use tracing::debug;

use crate::algorithms::trilateration::{TagFix, TagLocator};
use crate::error::Result;
use crate::processing::parser::LinkFrameDecoder;
use crate::utils::config::AppConfig;

/// One tag connection's receive state
pub struct LinkReceiver {
    decoder: LinkFrameDecoder,
    locator: TagLocator,
    fixes: u64,
}

impl LinkReceiver {
    pub fn new(locator: TagLocator) -> Self {
        Self {
            decoder: LinkFrameDecoder::new(),
            locator,
            fixes: 0,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(config.tag_locator()?))
    }

    pub fn locator(&self) -> &TagLocator {
        &self.locator
    }

    pub fn frames_decoded(&self) -> u64 {
        self.decoder.frames_decoded()
    }

    pub fn fixes(&self) -> u64 {
        self.fixes
    }

    /// Feed received text. Returns a fix when it completed a frame that
    /// locates the tag, `None` while a frame is still partial.
    ///
    /// # Errors
    ///
    /// [`LinkError::Frame`](crate::LinkError::Frame) for a malformed frame and
    /// [`LinkError::Locate`](crate::LinkError::Locate) when a decoded frame
    /// cannot be turned into a position. Both leave the receiver usable.
    pub fn feed(&mut self, chunk: &str) -> Result<Option<TagFix>> {
        let Some(links) = self.decoder.push(chunk)? else {
            return Ok(None);
        };
        debug!(links = links.len(), "locating tag");
        let fix = self.locator.locate(links.iter().map(|l| (l.address, l.range_m)))?;
        self.fixes += 1;
        Ok(Some(fix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::trilateration::LocateError;
    use crate::error::LinkError;

    fn square_receiver() -> LinkReceiver {
        let config = AppConfig::from_json_str(
            r#"{"anchors": {"AAA1": [0.0, 0.0, 0.0], "AAA2": [4.0, 0.0, 0.0], "AAA3": [0.0, 3.0, 0.0]}}"#,
        )
        .unwrap();
        LinkReceiver::from_config(&config).unwrap()
    }

    #[test]
    fn test_split_frame_yields_fix() {
        let mut receiver = square_receiver();
        // tag at (1.5, 1.0): ranges 1.803, 2.693, 2.5
        assert!(receiver.feed("{\"links\":[{\"A\":\"AAA1\",\"R\":\"1.803\"},").unwrap().is_none());
        let fix = receiver
            .feed("{\"A\":\"AAA2\",\"R\":\"2.693\"},{\"A\":\"AAA3\",\"R\":\"2.5\"}]}")
            .unwrap()
            .unwrap();
        assert!((fix.x_m - 1.5).abs() < 0.01);
        assert!((fix.y_m - 1.0).abs() < 0.01);
        assert_eq!(receiver.fixes(), 1);
        assert_eq!(receiver.frames_decoded(), 1);
    }

    #[test]
    fn test_malformed_frame_is_frame_error() {
        let mut receiver = square_receiver();
        let err = receiver.feed("{\"links\":[{\"A\":\"+AB\",\"R\":\"1.0\"}]}").unwrap_err();
        assert!(matches!(err, LinkError::Frame(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_too_few_anchors_is_locate_error() {
        let mut receiver = square_receiver();
        let err = receiver.feed("{\"links\":[{\"A\":\"AAA1\",\"R\":\"1.0\"}]}").unwrap_err();
        assert!(matches!(
            err,
            LinkError::Locate(LocateError::InsufficientAnchors { available: 1, required: 3 })
        ));
        assert_eq!(receiver.fixes(), 0);
    }

    #[test]
    fn test_bad_layout_is_config_error() {
        let mut config = AppConfig::default();
        config.anchors.insert("XYZ".into(), [0.0, 0.0, 0.0]);
        let err = LinkReceiver::from_config(&config).err().unwrap();
        assert!(err.is_config_error());
    }
}
