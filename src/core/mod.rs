//! Core types and constants for the anchor-link engine

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
