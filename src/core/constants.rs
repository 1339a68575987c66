//! Ranging constants and default operating parameters

/// Number of recent range samples kept per anchor
pub const HISTORY_CAPACITY: usize = 5;

/// Marker stored in unfilled history slots; also the "no reading" result
pub const EMPTY_SAMPLE: f32 = 0.0;

/// Lower bound of an admissible range sample (meters)
pub const DEFAULT_MIN_RANGE_M: f32 = 0.1;

/// Upper bound of an admissible range sample (meters)
pub const DEFAULT_MAX_RANGE_M: f32 = 10.0;

/// Factory antenna delay shared by every board before per-device correction (ticks)
pub const BASE_ANTENNA_DELAY: u16 = 16436;

/// Speed of light in air (m/s)
pub const SPEED_OF_LIGHT_AIR: f64 = 299_702_547.0;

/// Average duration of one radio timestamp tick (seconds)
pub const TICK_DURATION_S: f64 = 15.65e-12;

/// Distance covered by the radio signal during one tick (~4.69 mm)
pub const METERS_PER_TICK: f64 = SPEED_OF_LIGHT_AIR * TICK_DURATION_S;

/// Default period of the report tick (milliseconds)
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 100;

/// Default number of decimals of the `R` field on the wire
pub const DEFAULT_WIRE_PRECISION: usize = 1;

/// TCP port the link server listens on
pub const DEFAULT_SERVER_PORT: u16 = 5000;
