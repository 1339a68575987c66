//! Per-device antenna-delay calibration
//!
//! Every DW1000 board ranges with a small systematic bias caused by its
//! antenna and front-end delay. The boards in use were measured once and their
//! corrections are kept here as offsets from the factory delay. The effective
//! delay is computed once at startup and handed to the ranging engine.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{HardwareAddress, BASE_ANTENNA_DELAY, METERS_PER_TICK};

/// Offset returned for boards that were never calibrated
pub const FALLBACK_OFFSET: i16 = 0;

/// Measured offsets relative to [`BASE_ANTENNA_DELAY`], in ticks
const KNOWN_DEVICES: &[(&str, i16)] = &[
    ("A1:AA:5B:D5:A9:9A:E2:9C", 10),
    ("A2:AA:5B:D5:A9:9A:E2:9C", 75),
    ("A3:AA:5B:D5:A9:9A:E2:9C", 20),
    ("A4:AA:5B:D5:A9:9A:E2:9C", -30),
    // reference tag the anchors were calibrated against
    ("7D:00:22:EA:82:60:3B:9B", 0),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("Measurement references unknown device '{0}'")]
    UnknownDevice(String),

    #[error("Not enough independent measurements: {measurements} for {devices} devices")]
    Underdetermined { measurements: usize, devices: usize },

    #[error("Least-squares solve failed: {0}")]
    SolveFailed(String),
}

/// Static lookup from hardware address to antenna-delay offset
#[derive(Debug, Clone, Copy)]
pub struct CalibrationTable {
    entries: &'static [(&'static str, i16)],
    fallback: i16,
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CalibrationTable {
    /// Table of the calibrated boards
    pub fn builtin() -> Self {
        Self {
            entries: KNOWN_DEVICES,
            fallback: FALLBACK_OFFSET,
        }
    }

    /// Offset for `hardware_address`, matched exactly as written (uppercase,
    /// colon separated). Unknown boards get [`FALLBACK_OFFSET`].
    pub fn lookup(&self, hardware_address: &str) -> i16 {
        self.entries
            .iter()
            .find(|(known, _)| *known == hardware_address)
            .map_or(self.fallback, |&(_, offset)| offset)
    }

    pub fn lookup_address(&self, address: &HardwareAddress) -> i16 {
        self.lookup(&address.to_string())
    }

    pub fn is_known(&self, hardware_address: &str) -> bool {
        self.entries.iter().any(|(known, _)| *known == hardware_address)
    }

    /// `base_delay + offset`, saturating at the `u16` register bounds
    pub fn effective_antenna_delay(&self, base_delay: u16, address: &HardwareAddress) -> u16 {
        let offset = self.lookup_address(address);
        base_delay.saturating_add_signed(offset)
    }

    /// Effective delay relative to the factory default
    pub fn default_delay_for(&self, address: &HardwareAddress) -> u16 {
        self.effective_antenna_delay(BASE_ANTENNA_DELAY, address)
    }
}

/// One calibration run between two devices at a surveyed distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayMeasurement {
    pub device_a: String,
    pub device_b: String,
    pub true_distance_m: f64,
    pub measured_distance_m: f64,
}

/// Estimated delay of one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AntennaDelayEstimate {
    pub device: String,
    pub delay_m: f64,
    pub delay_ticks: f64,
}

/// Solve `measured - true = tau_a + tau_b` for every device's delay.
///
/// Needs at least as many independent measurements as devices; three devices
/// ranged pairwise (a triangle) is the smallest useful set.
pub fn estimate_antenna_delays(
    devices: &[&str],
    measurements: &[DelayMeasurement],
) -> Result<Vec<AntennaDelayEstimate>, CalibrationError> {
    let n = devices.len();
    let m = measurements.len();
    if n == 0 || m < n {
        return Err(CalibrationError::Underdetermined { measurements: m, devices: n });
    }

    let index_of = |name: &str| {
        devices
            .iter()
            .position(|d| *d == name)
            .ok_or_else(|| CalibrationError::UnknownDevice(name.to_string()))
    };

    let mut a_matrix = DMatrix::<f64>::zeros(m, n);
    let mut b_vector = DVector::<f64>::zeros(m);
    for (row, measurement) in measurements.iter().enumerate() {
        let i = index_of(&measurement.device_a)?;
        let j = index_of(&measurement.device_b)?;
        a_matrix[(row, i)] += 1.0;
        a_matrix[(row, j)] += 1.0;
        b_vector[row] = measurement.measured_distance_m - measurement.true_distance_m;
    }

    let svd = a_matrix.svd(true, true);
    let rank = svd.rank(1e-9);
    if rank < n {
        return Err(CalibrationError::Underdetermined { measurements: rank, devices: n });
    }
    let tau = svd
        .solve(&b_vector, 1e-10)
        .map_err(|e| CalibrationError::SolveFailed(e.to_string()))?;

    Ok(devices
        .iter()
        .zip(tau.iter())
        .map(|(device, &delay_m)| AntennaDelayEstimate {
            device: device.to_string(),
            delay_m,
            delay_ticks: delay_m / METERS_PER_TICK,
        })
        .collect())
}

/// Delay of an anchor ranged against an already calibrated tag
pub fn anchor_delay_from_single_link(
    true_distance_m: f64,
    measured_distance_m: f64,
    tag_delay_m: f64,
) -> AntennaDelayEstimate {
    let delay_m = measured_distance_m - true_distance_m - tag_delay_m;
    AntennaDelayEstimate {
        device: "anchor".to_string(),
        delay_m,
        delay_ticks: delay_m / METERS_PER_TICK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_offsets() {
        let table = CalibrationTable::builtin();
        assert_eq!(table.lookup("A1:AA:5B:D5:A9:9A:E2:9C"), 10);
        assert_eq!(table.lookup("A2:AA:5B:D5:A9:9A:E2:9C"), 75);
        assert_eq!(table.lookup("A4:AA:5B:D5:A9:9A:E2:9C"), -30);
        assert!(table.is_known("7D:00:22:EA:82:60:3B:9B"));
    }

    #[test]
    fn test_unknown_address_gets_fallback() {
        let table = CalibrationTable::builtin();
        assert_eq!(table.lookup("01:02:03:04:05:06:07:08"), FALLBACK_OFFSET);
        assert_eq!(table.lookup(""), FALLBACK_OFFSET);
        // matching is exact, lowercase spelling is not recognized
        assert_eq!(table.lookup("a2:aa:5b:d5:a9:9a:e2:9c"), FALLBACK_OFFSET);
    }

    #[test]
    fn test_effective_delay() {
        let table = CalibrationTable::builtin();
        let a4: HardwareAddress = "A4:AA:5B:D5:A9:9A:E2:9C".parse().unwrap();
        assert_eq!(table.default_delay_for(&a4), 16406);

        let a2: HardwareAddress = "a2:aa:5b:d5:a9:9a:e2:9c".parse().unwrap();
        assert_eq!(table.effective_antenna_delay(BASE_ANTENNA_DELAY, &a2), 16511);

        let unknown: HardwareAddress = "01:02:03:04:05:06:07:08".parse().unwrap();
        assert_eq!(table.default_delay_for(&unknown), BASE_ANTENNA_DELAY);
    }

    fn measurement(a: &str, b: &str, true_m: f64, measured_m: f64) -> DelayMeasurement {
        DelayMeasurement {
            device_a: a.to_string(),
            device_b: b.to_string(),
            true_distance_m: true_m,
            measured_distance_m: measured_m,
        }
    }

    #[test]
    fn test_triangle_estimation() {
        let devices = ["Tag", "Anchor1", "Anchor4"];
        let measurements = vec![
            measurement("Tag", "Anchor1", 3.6068, 4.092),
            measurement("Tag", "Anchor4", 3.8608, 4.262),
            measurement("Anchor1", "Anchor4", 2.5400, 2.664),
        ];

        let estimates = estimate_antenna_delays(&devices, &measurements).unwrap();
        assert_eq!(estimates.len(), 3);
        assert!((estimates[0].delay_m - 0.3812).abs() < 1e-6);
        assert!((estimates[1].delay_m - 0.1040).abs() < 1e-6);
        assert!((estimates[2].delay_m - 0.0200).abs() < 1e-6);
        assert!((estimates[0].delay_ticks - 0.3812 / METERS_PER_TICK).abs() < 1e-6);
    }

    #[test]
    fn test_underdetermined_is_rejected() {
        let devices = ["Tag", "Anchor1", "Anchor4"];
        let measurements = vec![measurement("Tag", "Anchor1", 3.0, 3.2)];
        assert!(matches!(
            estimate_antenna_delays(&devices, &measurements),
            Err(CalibrationError::Underdetermined { .. })
        ));
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let devices = ["Tag", "Anchor1"];
        let measurements = vec![
            measurement("Tag", "Anchor1", 3.0, 3.2),
            measurement("Tag", "Anchor9", 3.0, 3.2),
        ];
        assert_eq!(
            estimate_antenna_delays(&devices, &measurements),
            Err(CalibrationError::UnknownDevice("Anchor9".to_string()))
        );
    }

    #[test]
    fn test_single_link_estimate() {
        let estimate = anchor_delay_from_single_link(3.37, 3.181, 0.0);
        assert!((estimate.delay_m + 0.189).abs() < 1e-9);
        assert!(estimate.delay_ticks < -40.0 && estimate.delay_ticks > -41.0);
    }
}
