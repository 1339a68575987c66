use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::algorithms::TagLocator;
use crate::core::{
    HardwareAddress, ShortAddress, BASE_ANTENNA_DELAY, DEFAULT_MAX_RANGE_M, DEFAULT_MIN_RANGE_M,
    DEFAULT_REPORT_INTERVAL_MS, DEFAULT_SERVER_PORT, DEFAULT_WIRE_PRECISION,
};
use crate::hardware::DeviceRole;
use crate::processing::RangeDomain;

/// Shortest accepted report period (milliseconds)
pub const MIN_REPORT_INTERVAL_MS: u64 = 10;
/// Longest accepted report period (milliseconds)
pub const MAX_REPORT_INTERVAL_MS: u64 = 5000;

const DEFAULT_HARDWARE_ADDRESS: &str = "7D:00:22:EA:82:60:3B:9B";

/// Complete device configuration, loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub ranging: RangingConfig,
    pub report: ReportConfig,
    /// Surveyed anchor positions keyed by short address in hex (e.g. "AAA1")
    pub anchors: BTreeMap<String, [f64; 3]>,
    pub locator: LocatorConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub role: DeviceRole,
    /// Eight colon-separated hex bytes
    pub hardware_address: String,
    /// Enable debug logging
    pub debug_logging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangingConfig {
    pub min_range_m: f32,
    pub max_range_m: f32,
    /// Antenna delay before the per-device calibration offset (ticks)
    pub base_antenna_delay: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub interval_ms: u64,
    /// Decimals of the `R` field on the wire
    pub precision: usize,
    /// `host:port` of the link server; no network output when absent
    pub server_addr: Option<String>,
    /// Render the filtered links on the local panel
    pub display: bool,
    pub reconnect_interval_ms: u64,
    /// Bound on one connect attempt; must stay below `interval_ms`
    pub connect_timeout_ms: u64,
}

/// Host-side link server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` the link server listens on
    pub listen_addr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub min_anchors: usize,
    pub max_accepted_range_m: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            role: DeviceRole::Tag,
            hardware_address: DEFAULT_HARDWARE_ADDRESS.to_string(),
            debug_logging: false,
        }
    }
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            min_range_m: DEFAULT_MIN_RANGE_M,
            max_range_m: DEFAULT_MAX_RANGE_M,
            base_antenna_delay: BASE_ANTENNA_DELAY,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            precision: DEFAULT_WIRE_PRECISION,
            server_addr: None,
            display: true,
            reconnect_interval_ms: 2000,
            connect_timeout_ms: 50,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_SERVER_PORT}"),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_anchors: 3,
            max_accepted_range_m: 15.0,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to access configuration file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse configuration: {message}")]
    Parse { message: String },

    #[error("Invalid value '{value}' for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        if !path.as_ref().exists() {
            return Err(ConfigError::NotFound { path: path_str });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

        Self::from_json_str(&content)
    }

    /// Parses and validates a JSON document; absent fields take their defaults.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::Io {
            path: path_str,
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hardware_address()?;

        let ranging = &self.ranging;
        if !ranging.min_range_m.is_finite() || ranging.min_range_m <= 0.0 {
            return Err(ConfigError::invalid(
                "ranging.min_range_m",
                ranging.min_range_m,
                "must be a finite value above zero",
            ));
        }
        if !ranging.max_range_m.is_finite() || ranging.max_range_m <= ranging.min_range_m {
            return Err(ConfigError::invalid(
                "ranging.max_range_m",
                ranging.max_range_m,
                "must be finite and greater than min_range_m",
            ));
        }

        let report = &self.report;
        if !(MIN_REPORT_INTERVAL_MS..=MAX_REPORT_INTERVAL_MS).contains(&report.interval_ms) {
            return Err(ConfigError::invalid(
                "report.interval_ms",
                report.interval_ms,
                "must be between 10 and 5000",
            ));
        }
        if report.precision > crate::api::formatting::MAX_PRECISION {
            return Err(ConfigError::invalid(
                "report.precision",
                report.precision,
                "must be between 0 and 6",
            ));
        }
        if report.connect_timeout_ms == 0 || report.connect_timeout_ms >= report.interval_ms {
            return Err(ConfigError::invalid(
                "report.connect_timeout_ms",
                report.connect_timeout_ms,
                "must be above zero and below interval_ms",
            ));
        }
        if let Some(addr) = &report.server_addr {
            if !is_host_port(addr, false) {
                return Err(ConfigError::invalid(
                    "report.server_addr",
                    addr,
                    "expected host:port",
                ));
            }
        }
        if !is_host_port(&self.server.listen_addr, true) {
            return Err(ConfigError::invalid(
                "server.listen_addr",
                &self.server.listen_addr,
                "expected host:port",
            ));
        }

        self.anchor_layout()?;

        let locator = &self.locator;
        if locator.min_anchors < 2 {
            return Err(ConfigError::invalid(
                "locator.min_anchors",
                locator.min_anchors,
                "at least two anchors are needed for a fix",
            ));
        }
        if !locator.max_accepted_range_m.is_finite() || locator.max_accepted_range_m <= 0.0 {
            return Err(ConfigError::invalid(
                "locator.max_accepted_range_m",
                locator.max_accepted_range_m,
                "must be a finite value above zero",
            ));
        }

        Ok(())
    }

    pub fn hardware_address(&self) -> Result<HardwareAddress, ConfigError> {
        self.device.hardware_address.parse().map_err(|_| {
            ConfigError::invalid(
                "device.hardware_address",
                &self.device.hardware_address,
                "expected eight colon-separated hex bytes",
            )
        })
    }

    pub fn range_domain(&self) -> RangeDomain {
        RangeDomain::new(self.ranging.min_range_m, self.ranging.max_range_m)
    }

    /// Anchor positions keyed by parsed short address
    pub fn anchor_layout(&self) -> Result<Vec<(ShortAddress, [f64; 3])>, ConfigError> {
        self.anchors
            .iter()
            .map(|(id, position)| {
                let address = ShortAddress::from_hex(id)
                    .ok()
                    .filter(|a| a.is_valid())
                    .ok_or_else(|| ConfigError::invalid("anchors", id, "expected 1-4 hex digits, not zero"))?;
                if position.iter().any(|c| !c.is_finite()) {
                    return Err(ConfigError::invalid("anchors", id, "coordinates must be finite"));
                }
                Ok((address, *position))
            })
            .collect()
    }

    /// Locator seeded with the configured anchor layout
    pub fn tag_locator(&self) -> Result<TagLocator, ConfigError> {
        let mut locator = TagLocator::new(self.locator.min_anchors, self.locator.max_accepted_range_m);
        for (address, position) in self.anchor_layout()? {
            locator.add_anchor(address, position);
        }
        Ok(locator)
    }
}

/// `host:port` with a non-empty host; port 0 only where the OS may pick one
fn is_host_port(addr: &str, allow_any_port: bool) -> bool {
    addr.rsplit_once(':').is_some_and(|(host, port)| {
        !host.is_empty() && port.parse::<u16>().is_ok_and(|p| allow_any_port || p != 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.report.interval_ms, 100);
        assert_eq!(config.report.precision, 1);
        assert_eq!(config.range_domain(), RangeDomain::default());
        assert_eq!(config.ranging.base_antenna_delay, 16436);
        assert_eq!(config.server.listen_addr, "0.0.0.0:5000");
    }

    #[test]
    fn test_connect_timeout_below_report_interval() {
        let config = AppConfig::from_json_str(r#"{"report": {"interval_ms": 200, "connect_timeout_ms": 80}}"#)
            .unwrap();
        assert_eq!(config.report.connect_timeout_ms, 80);

        let err = AppConfig::from_json_str(r#"{"report": {"interval_ms": 100, "connect_timeout_ms": 2000}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { ref parameter, .. } if parameter == "report.connect_timeout_ms"));
        assert!(AppConfig::from_json_str(r#"{"report": {"connect_timeout_ms": 0}}"#).is_err());
    }

    #[test]
    fn test_listen_addr_override() {
        let config = AppConfig::from_json_str(r#"{"server": {"listen_addr": "127.0.0.1:6000"}}"#).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:6000");
        assert!(AppConfig::from_json_str(r#"{"server": {"listen_addr": "127.0.0.1:0"}}"#).is_ok());
        assert!(AppConfig::from_json_str(r#"{"server": {"listen_addr": "6000"}}"#).is_err());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = AppConfig::from_json_str(
            r#"{"device": {"role": "anchor"}, "report": {"interval_ms": 250}}"#,
        )
        .unwrap();
        assert_eq!(config.device.role, DeviceRole::Anchor);
        assert_eq!(config.report.interval_ms, 250);
        assert_eq!(config.report.precision, 1);
        assert_eq!(config.locator.min_anchors, 3);
    }

    #[test]
    fn test_rejects_inverted_range_domain() {
        let err = AppConfig::from_json_str(r#"{"ranging": {"min_range_m": 5.0, "max_range_m": 1.0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { ref parameter, .. } if parameter == "ranging.max_range_m"));
    }

    #[test]
    fn test_rejects_zero_lower_bound() {
        let err = AppConfig::from_json_str(r#"{"ranging": {"min_range_m": 0.0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { ref parameter, .. } if parameter == "ranging.min_range_m"));
    }

    #[test]
    fn test_rejects_out_of_bounds_report_settings() {
        assert!(AppConfig::from_json_str(r#"{"report": {"interval_ms": 5}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"report": {"precision": 7}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"report": {"server_addr": "no-port"}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"report": {"server_addr": "10.0.0.5:5000"}}"#).is_ok());
    }

    #[test]
    fn test_rejects_bad_addresses() {
        assert!(AppConfig::from_json_str(r#"{"device": {"hardware_address": "A4:AA"}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"anchors": {"XYZ": [0.0, 0.0, 0.0]}}"#).is_err());
        assert!(AppConfig::from_json_str(r#"{"anchors": {"0": [0.0, 0.0, 0.0]}}"#).is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            AppConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_anchor_layout_and_locator() {
        let config = AppConfig::from_json_str(
            r#"{"anchors": {"AAA1": [0.0, 0.0, 1.651], "aaa2": [0.7874, 2.667, 1.6764]}}"#,
        )
        .unwrap();
        let layout = config.anchor_layout().unwrap();
        assert_eq!(layout[0].0, ShortAddress(0xAAA1));
        assert_eq!(layout[1].0, ShortAddress(0xAAA2));
        assert_eq!(config.tag_locator().unwrap().anchor_count(), 2);
    }

    #[test]
    fn test_file_round_trip() {
        let mut config = AppConfig::default();
        config.report.server_addr = Some("192.168.1.10:5000".into());
        config.anchors.insert("AAA1".into(), [0.0, 0.0, 1.651]);

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        assert_eq!(AppConfig::from_file(file.path()).unwrap(), config);
    }

    #[test]
    fn test_load_from_written_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"report": {{"display": false}}}}"#).unwrap();
        let config = AppConfig::from_file(file.path()).unwrap();
        assert!(!config.report.display);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::from_file("/nonexistent/uwb-link.json"),
            Err(ConfigError::NotFound { .. })
        ));
    }
}
