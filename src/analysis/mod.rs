pub mod cache;
pub mod morton;
pub mod power;
pub mod schedule;

use crate::audio::bands::BandCutoffs;

/// What is measured per window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnalysisMode {
    /// One RMS value mapped through the colour table
    Mono,
    /// Low/mid/high RMS mapped straight onto red/green/blue
    Bands(BandCutoffs),
}
