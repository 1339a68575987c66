//! Peripheral error types and recovery policy

use thiserror::Error;

/// Failures of the radio, display or network peripherals
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    /// The display did not come up; the device has no output without it
    #[error("Display initialization failed: {reason}")]
    DisplayInit { reason: String },

    /// Writing a frame to the display failed
    #[error("Display write failed: {reason}")]
    DisplayWrite { reason: String },

    /// The ranging engine could not be started
    #[error("Ranging engine initialization failed: {reason}")]
    EngineInit { reason: String },

    /// The engine was polled before `start`
    #[error("Ranging engine is not running")]
    EngineNotRunning,

    /// The network peer is gone
    #[error("Connection to {peer} lost: {reason}")]
    ConnectionLost { peer: String, reason: String },

    /// Connecting to the network peer failed
    #[error("Could not connect to {peer}: {reason}")]
    ConnectFailed { peer: String, reason: String },
}

/// What the caller should do after a peripheral failure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Drop this operation and carry on with the next tick
    Skip,
    /// Reconnect later and carry on
    ReconnectLater,
    /// Stop in a permanent idle state
    Halt,
}

impl HardwareError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            HardwareError::DisplayInit { .. } | HardwareError::EngineInit { .. } => RecoveryStrategy::Halt,
            HardwareError::EngineNotRunning => RecoveryStrategy::Halt,
            HardwareError::DisplayWrite { .. } => RecoveryStrategy::Skip,
            HardwareError::ConnectionLost { .. } | HardwareError::ConnectFailed { .. } => {
                RecoveryStrategy::ReconnectLater
            }
        }
    }

    /// Initialization failures leave the unit without a useful function
    pub fn is_fatal(&self) -> bool {
        matches!(self.recovery_strategy(), RecoveryStrategy::Halt)
    }
}

/// Result type for peripheral operations
pub type HardwareResult<T> = Result<T, HardwareError>;
