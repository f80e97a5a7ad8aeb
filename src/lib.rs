//! Tempo-aligned RMS energy laid out along a Z-order curve.
//!
//! The signal is cut into windows spaced a fixed fraction of a beat apart,
//! each window's energy is measured, and window `i` is drawn at the Morton
//! coordinate of `i + offset`. When the cadence matches the track, bars and
//! phrases show up as aligned square blocks.

pub mod analysis;
pub mod audio;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod render;
