//! Periodic report tick
//!
//! Independently of ranging traffic, the reporter takes one registry snapshot
//! per tick, serializes it for the network and renders it on the display.
//! Both outputs come from the same snapshot and therefore always agree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::display::{DisplayAdapter, DisplayFrame};
use crate::api::formatting::LinkSerializer;
use crate::api::transport::Transport;
use crate::processing::registry::SharedRegistry;

/// Counters accumulated over the reporter's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub ticks: u64,
    pub sent: u64,
    /// Ticks where no transport was connected
    pub skipped: u64,
    pub send_failures: u64,
    pub display_failures: u64,
}

/// Outputs produced by one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub payload: String,
    pub frame: DisplayFrame,
    pub delivered: bool,
}

pub struct Reporter {
    registry: SharedRegistry,
    serializer: LinkSerializer,
    transport: Option<Box<dyn Transport + Send>>,
    display: Option<Box<dyn DisplayAdapter + Send>>,
    stats: ReportStats,
}

impl Reporter {
    pub fn new(registry: SharedRegistry, serializer: LinkSerializer) -> Self {
        Self {
            registry,
            serializer,
            transport: None,
            display: None,
            stats: ReportStats::default(),
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport + Send>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Attach an already initialized display
    pub fn with_display(mut self, display: Box<dyn DisplayAdapter + Send>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn stats(&self) -> ReportStats {
        self.stats
    }

    pub fn tick(&mut self) -> TickOutput {
        self.stats.ticks += 1;
        let snapshot = self.registry.snapshot();
        let payload = self.serializer.serialize(&snapshot);
        let frame = DisplayFrame::from_snapshot(&snapshot);

        let mut delivered = false;
        match self.transport.as_mut() {
            Some(transport) => {
                transport.maintain();
                if transport.is_connected() {
                    match transport.send(&payload) {
                        Ok(()) => {
                            self.stats.sent += 1;
                            delivered = true;
                        }
                        Err(e) => {
                            self.stats.send_failures += 1;
                            warn!(error = %e, "link frame not delivered");
                        }
                    }
                } else {
                    self.stats.skipped += 1;
                }
            }
            None => self.stats.skipped += 1,
        }

        if let Some(display) = self.display.as_mut() {
            if let Err(e) = display.render(&frame) {
                self.stats.display_failures += 1;
                debug!(error = %e, "display refresh failed");
            }
        }

        TickOutput {
            payload,
            frame,
            delivered,
        }
    }

    /// Run the tick on a worker thread every `interval` until stopped
    pub fn spawn(mut self, interval: Duration) -> std::io::Result<ReporterHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let join = std::thread::Builder::new()
            .name("reporter".to_string())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "reporter started");
                let mut next = Instant::now();
                while !stop_flag.load(Ordering::Relaxed) {
                    self.tick();
                    next += interval;
                    let now = Instant::now();
                    if next > now {
                        std::thread::sleep(next - now);
                    } else {
                        // Fell behind; do not try to catch up with a burst
                        next = now;
                    }
                }
                info!(ticks = self.stats.ticks, sent = self.stats.sent, "reporter stopped");
                self.stats
            })?;

        Ok(ReporterHandle { stop, join })
    }
}

/// Handle to a reporter running on its own thread
pub struct ReporterHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<ReportStats>,
}

impl ReporterHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the worker after its current tick and return its counters
    pub fn stop(self) -> Option<ReportStats> {
        self.stop.store(true, Ordering::Relaxed);
        self.join.join().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::display::TextDisplay;
    use crate::core::ShortAddress;
    use crate::hardware::error::{HardwareError, HardwareResult};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingTransport {
        connected: bool,
        fail_next: bool,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Transport for RecordingTransport {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn send(&mut self, payload: &str) -> HardwareResult<()> {
            if self.fail_next {
                self.fail_next = false;
                self.connected = false;
                return Err(HardwareError::ConnectionLost {
                    peer: "test".into(),
                    reason: "reset".into(),
                });
            }
            self.sent.lock().unwrap().push(payload.to_string());
            Ok(())
        }

        fn maintain(&mut self) {}
    }

    fn registry_with_anchor() -> SharedRegistry {
        let registry = SharedRegistry::default();
        let a = ShortAddress(0xAAAA);
        registry.insert(a);
        for range in [2.0, 2.2, 2.1] {
            registry.update_range(a, range, -80.0);
        }
        registry
    }

    #[test]
    fn test_tick_without_transport_is_skipped() {
        let mut reporter = Reporter::new(SharedRegistry::default(), LinkSerializer::new());
        let output = reporter.tick();
        assert_eq!(output.payload, "{\"links\":[]}");
        assert_eq!(output.frame, DisplayFrame::NoAnchors);
        assert!(!output.delivered);
        assert_eq!(reporter.stats().skipped, 1);
    }

    #[test]
    fn test_tick_sends_when_connected() {
        let transport = RecordingTransport {
            connected: true,
            ..Default::default()
        };
        let sent = Arc::clone(&transport.sent);
        let mut reporter = Reporter::new(registry_with_anchor(), LinkSerializer::new())
            .with_transport(Box::new(transport));

        let output = reporter.tick();
        assert!(output.delivered);
        assert_eq!(
            *sent.lock().unwrap(),
            vec!["{\"links\":[{\"A\":\"AAAA\",\"R\":\"2.1\"}]}".to_string()]
        );
        assert_eq!(reporter.stats().sent, 1);
    }

    #[test]
    fn test_disconnected_transport_is_skipped_silently() {
        let transport = RecordingTransport::default();
        let sent = Arc::clone(&transport.sent);
        let mut reporter = Reporter::new(registry_with_anchor(), LinkSerializer::new())
            .with_transport(Box::new(transport));

        reporter.tick();
        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(reporter.stats().skipped, 1);
        assert_eq!(reporter.stats().send_failures, 0);
    }

    #[test]
    fn test_send_failure_is_counted() {
        let transport = RecordingTransport {
            connected: true,
            fail_next: true,
            ..Default::default()
        };
        let mut reporter = Reporter::new(registry_with_anchor(), LinkSerializer::new())
            .with_transport(Box::new(transport));

        assert!(!reporter.tick().delivered);
        assert!(!reporter.tick().delivered);
        let stats = reporter.stats();
        assert_eq!(stats.send_failures, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.ticks, 2);
    }

    #[test]
    fn test_display_and_payload_agree() {
        let registry = registry_with_anchor();
        for (address, range) in [(0x0BB1, 4.3), (0xCCCC, 1.5)] {
            registry.insert(ShortAddress(address));
            registry.update_range(ShortAddress(address), range, -70.0);
        }
        let mut display = TextDisplay::new(Vec::new());
        display.init().unwrap();
        let mut reporter = Reporter::new(registry, LinkSerializer::new())
            .with_display(Box::new(display));

        let output = reporter.tick();
        assert_eq!(
            output.payload,
            "{\"links\":[{\"A\":\"AAAA\",\"R\":\"2.1\"},{\"A\":\"BB1\",\"R\":\"4.3\"},{\"A\":\"CCCC\",\"R\":\"1.5\"}]}"
        );
        let rows = match output.frame {
            DisplayFrame::Rows(rows) => rows,
            DisplayFrame::NoAnchors => panic!("expected rows"),
        };
        let displayed: Vec<_> = rows.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(displayed, vec!["AAAA", "0BB1", "CCCC"]);
        assert_eq!(rows[0].range, "2.10 m");
        assert_eq!(rows[1].range, "4.30 m");
        assert_eq!(reporter.stats().display_failures, 0);
    }

    #[test]
    fn test_spawned_reporter_ticks_until_stopped() {
        let registry = registry_with_anchor();
        let reporter = Reporter::new(registry.clone(), LinkSerializer::new());
        let handle = reporter.spawn(Duration::from_millis(5)).unwrap();

        for i in 0..50 {
            registry.update_range(ShortAddress(0xAAAA), 2.0 + (i % 3) as f32 * 0.1, -80.0);
            std::thread::sleep(Duration::from_millis(1));
        }

        let stats = handle.stop().unwrap();
        assert!(stats.ticks >= 1);
        assert_eq!(stats.ticks, stats.skipped);
    }
}
