//! Event handling and report outputs
//!
//! The session consumes ranging events; the reporter turns registry snapshots
//! into the wire payload and display frames on its own periodic tick.

pub mod callback;
pub mod display;
pub mod formatting;
pub mod host;
pub mod reporter;
pub mod transport;

pub use callback::{RangingSession, SessionStats};
pub use display::{DisplayAdapter, DisplayFrame, DisplayRow, TextDisplay};
pub use formatting::{LinkSerializer, WireFrame, WireLink, EMPTY_FRAME};
pub use host::LinkReceiver;
pub use reporter::{ReportStats, Reporter, ReporterHandle, TickOutput};
pub use transport::{TcpTransport, Transport};
