//! Hardware seams: the ranging engine, its calibration and peripheral errors
//!
//! The radio itself is external; this module defines the narrow interface the
//! rest of the crate talks to and a simulated engine implementing it.

pub mod calibration;
pub mod engine;
pub mod error;
pub mod mock;

pub use calibration::{CalibrationTable, DelayMeasurement, AntennaDelayEstimate, FALLBACK_OFFSET};
pub use engine::{DeviceRole, EngineConfig, RangingEngine, RangingEvent, RangingEventHandler};
pub use error::{HardwareError, HardwareResult, RecoveryStrategy};
pub use mock::SimulatedEngine;
