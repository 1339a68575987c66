//! Ranging engine interface
//!
//! The physical-layer protocol lives in the ranging engine. All this crate
//! sees of it is a closed set of events, delivered synchronously from
//! [`RangingEngine::poll`] to a [`RangingEventHandler`].

use serde::{Deserialize, Serialize};

use crate::core::{HardwareAddress, ShortAddress, BASE_ANTENNA_DELAY};
use crate::hardware::error::HardwareResult;

/// Which side of the ranging exchange this device plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Mobile device ranging against the anchors
    Tag,
    /// Fixed device answering tag polls
    Anchor,
}

impl std::fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceRole::Tag => write!(f, "TAG"),
            DeviceRole::Anchor => write!(f, "ANCHOR"),
        }
    }
}

/// Events emitted by the ranging engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangingEvent {
    /// A ranging round with `address` completed
    NewRange {
        address: ShortAddress,
        range_m: f32,
        rx_power_dbm: f32,
    },
    /// A peer joined the ranging session (tag side)
    DeviceDiscovered(ShortAddress),
    /// A tag announced itself (anchor side)
    DeviceBlinked(ShortAddress),
    /// The engine stopped hearing from a peer
    DeviceInactive(ShortAddress),
}

impl RangingEvent {
    pub fn address(&self) -> ShortAddress {
        match *self {
            RangingEvent::NewRange { address, .. } => address,
            RangingEvent::DeviceDiscovered(address)
            | RangingEvent::DeviceBlinked(address)
            | RangingEvent::DeviceInactive(address) => address,
        }
    }
}

/// Receiver of engine events. Implementations must return quickly and never
/// block on I/O: they run inside the engine's poll.
pub trait RangingEventHandler {
    fn on_event(&mut self, event: RangingEvent);
}

impl<F: FnMut(RangingEvent)> RangingEventHandler for F {
    fn on_event(&mut self, event: RangingEvent) {
        self(event)
    }
}

/// Parameters handed to the engine once, before it starts
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub role: DeviceRole,
    pub address: HardwareAddress,
    /// Calibrated antenna delay in ticks
    pub antenna_delay: u16,
}

impl EngineConfig {
    pub fn new(role: DeviceRole, address: HardwareAddress) -> Self {
        Self {
            role,
            address,
            antenna_delay: BASE_ANTENNA_DELAY,
        }
    }

    pub fn with_antenna_delay(mut self, antenna_delay: u16) -> Self {
        self.antenna_delay = antenna_delay;
        self
    }
}

/// Hardware abstraction for the UWB ranging engine
pub trait RangingEngine {
    /// Configure the radio and begin ranging in the configured role
    fn start(&mut self, config: &EngineConfig) -> HardwareResult<()>;

    /// Service the radio, delivering any pending events to `handler`.
    ///
    /// Returns the number of events delivered.
    fn poll(&mut self, handler: &mut dyn RangingEventHandler) -> HardwareResult<usize>;

    fn is_running(&self) -> bool;

    /// Configuration the engine was started with
    fn config(&self) -> Option<&EngineConfig>;
}
