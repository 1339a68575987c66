//! Unified error type for the anchor-link crate.
//!
//! Registry and smoother operations never fail; the variants here cover the
//! edges of the system: configuration, peripherals, received frames, position
//! solving and address parsing. Each module keeps its own specific error type
//! and converts into [`LinkError`] at the boundary.

use thiserror::Error;

use crate::algorithms::trilateration::LocateError;
use crate::hardware::error::HardwareError;
use crate::processing::parser::FrameError;
use crate::utils::config::ConfigError;

#[derive(Debug, Error)]
pub enum LinkError {
    /// A short address string was not 1-4 hex digits.
    #[error("Invalid short address: '{0}'. Expected 1-4 hex digits (e.g. 'AAA1').")]
    InvalidShortAddress(String),

    /// A hardware address string was not eight colon-separated hex bytes.
    #[error("Invalid hardware address: '{0}'. Expected 8 hex bytes like 'A4:AA:5B:D5:A9:9A:E2:9C'.")]
    InvalidHardwareAddress(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for anchor-link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

impl LinkError {
    /// Returns `true` if the error comes from a peripheral the device cannot run without.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Hardware(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Returns `true` if the error was caused by the configuration rather than the environment.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidHardwareAddress(_) | Self::InvalidShortAddress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_init_failure_is_fatal() {
        let err: LinkError = HardwareError::DisplayInit {
            reason: "no ack at 0x3C".into(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_address_errors_are_config_errors() {
        let err = LinkError::InvalidHardwareAddress("bogus".into());
        assert!(err.is_config_error());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_module_errors_convert() {
        let err: LinkError = FrameError::InvalidRange("far".into()).into();
        assert!(matches!(err, LinkError::Frame(_)));
        assert!(!err.is_fatal());

        let err: LinkError = LocateError::InsufficientAnchors { available: 1, required: 3 }.into();
        assert!(err.to_string().contains("1 usable"));

        let err: LinkError = ConfigError::NotFound { path: "uwb.json".into() }.into();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LinkError>();
        assert_sync::<LinkError>();
    }
}
