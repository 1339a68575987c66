//! UWB anchor-link tracking
//!
//! A tag ranges against fixed anchors, keeps a median-smoothed range per
//! anchor and periodically reports the filtered links as a compact JSON frame.
//! The receiving side decodes those frames and locates the tag.

pub mod core;
pub mod error;
pub mod algorithms;
pub mod processing;
pub mod hardware;
pub mod api;
pub mod utils;

// Re-export commonly used types
pub use core::{HardwareAddress, ShortAddress, HISTORY_CAPACITY, EMPTY_SAMPLE};
pub use error::{LinkError, Result};
pub use algorithms::{LocateError, TagFix, TagLocator};
pub use processing::{
    AnchorLink, AnchorRegistry, DecodedLink, FrameError, LinkFrameDecoder, LinkRecord, RangeDomain,
    RangeSmoother, SharedRegistry,
};
pub use hardware::{
    CalibrationTable, DeviceRole, EngineConfig, HardwareError, RangingEngine, RangingEvent,
    RangingEventHandler, SimulatedEngine,
};
pub use api::{
    DisplayAdapter, DisplayFrame, LinkReceiver, LinkSerializer, RangingSession, ReportStats, Reporter,
    ReporterHandle, TcpTransport, TextDisplay, Transport,
};
pub use utils::{AppConfig, ConfigError};
