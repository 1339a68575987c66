//! Positioning algorithms

pub mod trilateration;

pub use trilateration::{LocateError, TagFix, TagLocator};
