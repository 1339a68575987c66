//! Simulated ranging engine for tests and for running without a radio

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::core::ShortAddress;
use crate::hardware::engine::{DeviceRole, EngineConfig, RangingEngine, RangingEvent, RangingEventHandler};
use crate::hardware::error::{HardwareError, HardwareResult};

/// A peer at a fixed true distance from this device
#[derive(Debug, Clone)]
struct SimulatedPeer {
    address: ShortAddress,
    distance_m: f32,
    rx_power_dbm: f32,
    announced: bool,
    dropping: bool,
}

/// Ranging engine that produces scripted and synthetic events
pub struct SimulatedEngine {
    config: Option<EngineConfig>,
    scripted: VecDeque<RangingEvent>,
    peers: Vec<SimulatedPeer>,
    noise_m: f32,
    outlier_probability: f64,
    rng: StdRng,
    polls: u64,
    start_failure: Option<String>,
}

impl SimulatedEngine {
    /// Create an engine whose noise sequence is fixed by `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            config: None,
            scripted: VecDeque::new(),
            peers: Vec::new(),
            noise_m: 0.05,
            outlier_probability: 0.0,
            rng: StdRng::seed_from_u64(seed),
            polls: 0,
            start_failure: None,
        }
    }

    /// Uniform noise amplitude added to every synthetic range (meters)
    pub fn with_noise(mut self, noise_m: f32) -> Self {
        self.noise_m = noise_m.abs();
        self
    }

    /// Probability of a multipath outlier on each synthetic range
    pub fn with_outliers(mut self, probability: f64) -> Self {
        self.outlier_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Make the next `start` fail, as a radio that does not answer on SPI would
    pub fn fail_start(&mut self, reason: impl Into<String>) {
        self.start_failure = Some(reason.into());
    }

    /// Add a peer that will be announced on the next poll and ranged on every poll after
    pub fn add_peer(&mut self, address: ShortAddress, distance_m: f32, rx_power_dbm: f32) {
        self.peers.push(SimulatedPeer {
            address,
            distance_m,
            rx_power_dbm,
            announced: false,
            dropping: false,
        });
    }

    /// Change the true distance a peer is ranged at from the next poll on
    pub fn move_peer(&mut self, address: ShortAddress, distance_m: f32) {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.address == address) {
            peer.distance_m = distance_m;
        }
    }

    /// Silence a peer; the next poll reports it inactive
    pub fn drop_peer(&mut self, address: ShortAddress) {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.address == address) {
            peer.dropping = true;
        }
    }

    /// Queue an event to be delivered verbatim on the next poll
    pub fn push_event(&mut self, event: RangingEvent) {
        self.scripted.push_back(event);
    }

    pub fn push_events(&mut self, events: impl IntoIterator<Item = RangingEvent>) {
        self.scripted.extend(events);
    }

    pub fn pending_events(&self) -> usize {
        self.scripted.len()
    }

    pub fn poll_count(&self) -> u64 {
        self.polls
    }

    fn sample_range(&mut self, distance_m: f32) -> f32 {
        let mut range = distance_m;
        if self.noise_m > 0.0 {
            range += self.rng.gen_range(-self.noise_m..=self.noise_m);
        }
        if self.outlier_probability > 0.0 && self.rng.gen_bool(self.outlier_probability) {
            // NLOS paths only ever lengthen the measured range
            range += self.rng.gen_range(1.0..4.0);
        }
        range
    }
}

impl RangingEngine for SimulatedEngine {
    fn start(&mut self, config: &EngineConfig) -> HardwareResult<()> {
        if let Some(reason) = self.start_failure.take() {
            return Err(HardwareError::EngineInit { reason });
        }
        info!(
            role = %config.role,
            address = %config.address,
            antenna_delay = config.antenna_delay,
            "simulated ranging engine started"
        );
        self.config = Some(config.clone());
        Ok(())
    }

    fn poll(&mut self, handler: &mut dyn RangingEventHandler) -> HardwareResult<usize> {
        let role = self.config.as_ref().map(|c| c.role).ok_or(HardwareError::EngineNotRunning)?;
        self.polls += 1;
        let mut delivered = 0;

        while let Some(event) = self.scripted.pop_front() {
            handler.on_event(event);
            delivered += 1;
        }

        let mut idx = 0;
        while idx < self.peers.len() {
            if self.peers[idx].dropping {
                let peer = self.peers.remove(idx);
                debug!(address = %peer.address, "simulated peer went silent");
                handler.on_event(RangingEvent::DeviceInactive(peer.address));
                delivered += 1;
                continue;
            }

            if !self.peers[idx].announced {
                self.peers[idx].announced = true;
                let address = self.peers[idx].address;
                let event = match role {
                    DeviceRole::Tag => RangingEvent::DeviceDiscovered(address),
                    DeviceRole::Anchor => RangingEvent::DeviceBlinked(address),
                };
                handler.on_event(event);
                delivered += 1;
            }

            let (address, distance_m, rx_power_dbm) = {
                let peer = &self.peers[idx];
                (peer.address, peer.distance_m, peer.rx_power_dbm)
            };
            let range_m = self.sample_range(distance_m);
            handler.on_event(RangingEvent::NewRange {
                address,
                range_m,
                rx_power_dbm,
            });
            delivered += 1;
            idx += 1;
        }

        Ok(delivered)
    }

    fn is_running(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Option<&EngineConfig> {
        self.config.as_ref()
    }
}
