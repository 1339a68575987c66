//! Tag firmware entry point
//!
//! Usage: `uwb-tag [config.json]`. Without a path the built-in defaults apply.

use std::io::Stdout;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use uwb_link::api::DisplayAdapter;
use uwb_link::hardware::RecoveryStrategy;
use uwb_link::utils::logging;
use uwb_link::{
    AnchorRegistry, AppConfig, CalibrationTable, DeviceRole, EngineConfig, HardwareAddress,
    LinkSerializer, RangingEngine, RangingSession, Reporter, SharedRegistry, SimulatedEngine,
    TcpTransport, TextDisplay,
};

/// Where the simulated tag sits in the anchor frame (meters)
const SIMULATED_TAG_POSITION: [f64; 3] = [1.0, 1.0, 1.0];
const SIMULATION_SEED: u64 = 0x5EED;
const IDLE_POLL_DELAY: Duration = Duration::from_millis(5);

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(arg) if arg == "--help" || arg == "-h" => {
            eprintln!("Usage: uwb-tag [config.json]");
            return Ok(());
        }
        Some(path) => AppConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        None => AppConfig::default(),
    };

    logging::init(config.device.debug_logging)?;

    let hardware_address = config.hardware_address()?;
    let role = config.device.role;
    let antenna_delay = CalibrationTable::builtin()
        .effective_antenna_delay(config.ranging.base_antenna_delay, &hardware_address);
    info!(%role, address = %hardware_address, antenna_delay, "device starting");

    let engine_config = EngineConfig::new(role, hardware_address).with_antenna_delay(antenna_delay);
    let (mut display, mut engine) = match bring_up(&config, &engine_config) {
        Ok(peripherals) => peripherals,
        Err(e) if e.is_fatal() => halt(&e),
        Err(e) => return Err(e).context("starting peripherals"),
    };

    let registry = SharedRegistry::new(AnchorRegistry::with_domain(config.range_domain()));
    let mut session = RangingSession::new(role, registry.clone());

    let reporter = match role {
        DeviceRole::Tag => {
            let serializer = LinkSerializer::new().with_precision(config.report.precision);
            let mut reporter = Reporter::new(registry, serializer);
            if let Some(peer) = &config.report.server_addr {
                let reconnect = Duration::from_millis(config.report.reconnect_interval_ms);
                let transport = TcpTransport::new(peer.clone(), reconnect)
                    .with_connect_timeout(Duration::from_millis(config.report.connect_timeout_ms));
                reporter = reporter.with_transport(Box::new(transport));
            }
            if let Some(panel) = display.take() {
                reporter = reporter.with_display(Box::new(panel));
            }
            Some(
                reporter
                    .spawn(Duration::from_millis(config.report.interval_ms))
                    .context("spawning reporter")?,
            )
        }
        DeviceRole::Anchor => None,
    };

    loop {
        if reporter.as_ref().is_some_and(|handle| handle.is_finished()) {
            halt(&"reporter thread exited");
        }

        match engine.poll(&mut session) {
            Ok(0) => thread::sleep(IDLE_POLL_DELAY),
            Ok(events) => debug!(events, "engine polled"),
            Err(e) => match e.recovery_strategy() {
                RecoveryStrategy::Skip => warn!(error = %e, "ranging event dropped"),
                RecoveryStrategy::ReconnectLater => {
                    warn!(error = %e, "engine unavailable");
                    thread::sleep(IDLE_POLL_DELAY);
                }
                RecoveryStrategy::Halt => halt(&e),
            },
        }
    }
}

/// Initialize the panel and the radio, in that order
fn bring_up(
    config: &AppConfig,
    engine_config: &EngineConfig,
) -> uwb_link::Result<(Option<TextDisplay<Stdout>>, SimulatedEngine)> {
    let display = if config.report.display {
        let mut panel = TextDisplay::new(std::io::stdout());
        panel.init()?;
        panel.splash(engine_config.role, &engine_config.address)?;
        Some(panel)
    } else {
        None
    };

    let mut engine = simulated_engine(config, &engine_config.address)?;
    engine.start(engine_config)?;
    Ok((display, engine))
}

/// Stand-in radio seeded from the configured anchor layout
fn simulated_engine(config: &AppConfig, own_address: &HardwareAddress) -> uwb_link::Result<SimulatedEngine> {
    let mut engine = SimulatedEngine::new(SIMULATION_SEED ^ u64::from(own_address.short_address().raw()));
    for (address, position) in config.anchor_layout()? {
        let distance = SIMULATED_TAG_POSITION
            .iter()
            .zip(position)
            .map(|(t, a)| (t - a).powi(2))
            .sum::<f64>()
            .sqrt() as f32;
        engine.add_peer(address, distance, rx_power_for(distance));
    }
    Ok(engine)
}

/// Free-space estimate used for the simulated RSSI (dBm)
fn rx_power_for(distance_m: f32) -> f32 {
    -60.0 - 20.0 * distance_m.max(0.1).log10()
}

/// A required peripheral failed: the device stays parked until power cycle.
fn halt(cause: &dyn std::fmt::Display) -> ! {
    error!(error = %cause, "fatal failure, halting");
    loop {
        thread::park();
    }
}
