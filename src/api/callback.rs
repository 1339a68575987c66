//! Event-driven ranging session
//!
//! [`RangingSession`] is the handler the ranging engine calls back into. In the
//! tag role it keeps the anchor registry in step with the engine's view of the
//! network; in the anchor role there is no registry and events are only logged.

use serde::Serialize;
use tracing::{debug, info};

use crate::hardware::engine::{DeviceRole, RangingEvent, RangingEventHandler};
use crate::processing::registry::{LinkRecord, SharedRegistry};

/// Event counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub discovered: u64,
    pub blinks: u64,
    pub ranges: u64,
    /// Ranges for anchors that were never discovered
    pub unmatched_ranges: u64,
    pub inactive: u64,
}

pub struct RangingSession {
    role: DeviceRole,
    registry: SharedRegistry,
    stats: SessionStats,
}

impl RangingSession {
    pub fn new(role: DeviceRole, registry: SharedRegistry) -> Self {
        Self {
            role,
            registry,
            stats: SessionStats::default(),
        }
    }

    /// Tag-role session over a fresh registry
    pub fn tag() -> Self {
        Self::new(DeviceRole::Tag, SharedRegistry::default())
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    /// Handle for readers such as the reporter
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> Vec<LinkRecord> {
        self.registry.snapshot()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    fn handle_tag_event(&mut self, event: RangingEvent) {
        match event {
            RangingEvent::DeviceDiscovered(address) => {
                self.stats.discovered += 1;
                info!(short = %address, "ranging init; device added");
                self.registry.insert(address);
            }
            RangingEvent::DeviceBlinked(address) => {
                self.stats.blinks += 1;
                debug!(short = %address, "blink ignored in tag role");
            }
            RangingEvent::NewRange {
                address,
                range_m,
                rx_power_dbm,
            } => {
                self.stats.ranges += 1;
                debug!(from = %address, range_m, rx_power_dbm, "new range");
                if !self.registry.update_range(address, range_m, rx_power_dbm) {
                    self.stats.unmatched_ranges += 1;
                }
            }
            RangingEvent::DeviceInactive(address) => {
                self.stats.inactive += 1;
                info!(short = %address, "delete inactive device");
                self.registry.remove(address);
            }
        }
    }

    fn handle_anchor_event(&mut self, event: RangingEvent) {
        match event {
            RangingEvent::DeviceBlinked(address) => {
                self.stats.blinks += 1;
                info!(short = %address, "blink; device added");
            }
            RangingEvent::DeviceDiscovered(address) => {
                self.stats.discovered += 1;
                info!(short = %address, "ranging init; device added");
            }
            RangingEvent::NewRange {
                address,
                range_m,
                rx_power_dbm,
            } => {
                self.stats.ranges += 1;
                debug!(from = %address, range_m, rx_power_dbm, "new range");
            }
            RangingEvent::DeviceInactive(address) => {
                self.stats.inactive += 1;
                info!(short = %address, "delete inactive device");
            }
        }
    }
}

impl RangingEventHandler for RangingSession {
    fn on_event(&mut self, event: RangingEvent) {
        match self.role {
            DeviceRole::Tag => self.handle_tag_event(event),
            DeviceRole::Anchor => self.handle_anchor_event(event),
        }
    }
}
