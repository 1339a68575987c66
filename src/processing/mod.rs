//! Range smoothing, link bookkeeping and received-frame decoding

pub mod smoother;
pub mod registry;
pub mod parser;

pub use smoother::{RangeDomain, RangeSmoother};
pub use registry::{AnchorLink, AnchorRegistry, LinkRecord, SharedRegistry};
pub use parser::{DecodedLink, FrameError, LinkFrameDecoder};
