//! Domain logic and core data structures
//!
//! Pure data and math with no knowledge of windows, surfaces or HTTP.

pub mod core;
pub mod form;
pub mod geometry;
pub mod motion;
