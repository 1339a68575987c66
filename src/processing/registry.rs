//! Anchor-link registry
//!
//! One [`AnchorLink`] per discovered anchor, kept in discovery order. The
//! registry is the single owner of every link and its smoother; readers only
//! ever see [`LinkRecord`] snapshots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, trace};

use crate::core::ShortAddress;
use crate::processing::smoother::{RangeDomain, RangeSmoother};

/// State kept for one known anchor
#[derive(Debug, Clone)]
pub struct AnchorLink {
    address: ShortAddress,
    history: RangeSmoother,
    /// Last received signal strength (dBm), not filtered
    signal_strength: f32,
}

impl AnchorLink {
    fn new(address: ShortAddress, domain: RangeDomain) -> Self {
        Self {
            address,
            history: RangeSmoother::new(domain),
            signal_strength: 0.0,
        }
    }

    pub fn address(&self) -> ShortAddress {
        self.address
    }

    pub fn filtered_range(&self) -> f32 {
        self.history.filtered()
    }

    pub fn signal_strength(&self) -> f32 {
        self.signal_strength
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    fn record(&self) -> LinkRecord {
        LinkRecord {
            address: self.address,
            range_m: self.history.filtered(),
            signal_strength_dbm: self.signal_strength,
        }
    }
}

/// Read-only view of one link at snapshot time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkRecord {
    pub address: ShortAddress,
    /// Median-filtered range, `0.0` when no valid sample exists yet
    pub range_m: f32,
    pub signal_strength_dbm: f32,
}

/// Ordered collection of anchor links keyed by short address
#[derive(Debug, Clone, Default)]
pub struct AnchorRegistry {
    links: Vec<AnchorLink>,
    domain: RangeDomain,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose smoothers admit samples from `domain`
    pub fn with_domain(domain: RangeDomain) -> Self {
        Self {
            links: Vec::new(),
            domain,
        }
    }

    /// Append a link for `address` unless it is already known.
    ///
    /// Returns `true` if a new link was created. The reserved address `0` is
    /// never inserted.
    pub fn insert(&mut self, address: ShortAddress) -> bool {
        if !address.is_valid() || self.position(address).is_some() {
            debug!(%address, "anchor already registered or invalid, insert ignored");
            return false;
        }
        self.links.push(AnchorLink::new(address, self.domain));
        debug!(%address, count = self.links.len(), "anchor registered");
        true
    }

    pub fn find(&self, address: ShortAddress) -> Option<&AnchorLink> {
        self.position(address).map(|idx| &self.links[idx])
    }

    /// Feed one raw measurement to the link for `address`.
    ///
    /// The signal strength is overwritten whenever the anchor is known; the
    /// range only enters the history if it lies inside the valid domain.
    /// Returns `false` if the anchor has not been discovered.
    pub fn update_range(&mut self, address: ShortAddress, raw_distance: f32, signal_strength: f32) -> bool {
        let Some(idx) = self.position(address) else {
            trace!(%address, "range for unknown anchor dropped");
            return false;
        };
        let link = &mut self.links[idx];
        if !link.history.push(raw_distance) {
            trace!(%address, raw_distance, "range sample outside valid domain");
        }
        link.signal_strength = signal_strength;
        true
    }

    /// Drop the link for `address`. Returns `true` if one was removed.
    pub fn remove(&mut self, address: ShortAddress) -> bool {
        match self.position(address) {
            Some(idx) => {
                self.links.remove(idx);
                debug!(%address, count = self.links.len(), "anchor removed");
                true
            }
            None => false,
        }
    }

    /// One record per link, in discovery order
    pub fn snapshot(&self) -> Vec<LinkRecord> {
        self.links.iter().map(AnchorLink::record).collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnchorLink> {
        self.links.iter()
    }

    pub fn domain(&self) -> RangeDomain {
        self.domain
    }

    fn position(&self, address: ShortAddress) -> Option<usize> {
        if !address.is_valid() || self.links.is_empty() {
            return None;
        }
        self.links.iter().position(|link| link.address == address)
    }
}

/// Registry handle shared between the ranging context and the report tick.
///
/// Every operation takes the lock for its whole duration, so a snapshot never
/// observes a half-applied event.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<AnchorRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: AnchorRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    pub fn insert(&self, address: ShortAddress) -> bool {
        self.lock().insert(address)
    }

    pub fn update_range(&self, address: ShortAddress, raw_distance: f32, signal_strength: f32) -> bool {
        self.lock().update_range(address, raw_distance, signal_strength)
    }

    pub fn remove(&self, address: ShortAddress) -> bool {
        self.lock().remove(address)
    }

    pub fn snapshot(&self) -> Vec<LinkRecord> {
        self.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run `f` with exclusive access to the registry
    pub fn with<R>(&self, f: impl FnOnce(&mut AnchorRegistry) -> R) -> R {
        f(&mut self.lock())
    }

    // A panic while holding the lock cannot leave a link half-written: every
    // mutation is a single push/remove or a scalar store.
    fn lock(&self) -> MutexGuard<'_, AnchorRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
