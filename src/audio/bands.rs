//! Three-way frequency split feeding the RGB mode.

use anyhow::Result;
use serde::Deserialize;
use std::f64::consts::PI;

use crate::error::ConfigError;

/// Butterworth response for a single biquad section.
const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct BandCutoffs {
    pub low_mid_hz: f64,
    pub mid_high_hz: f64,
}

impl Default for BandCutoffs {
    fn default() -> Self {
        Self {
            low_mid_hz: 250.0,
            mid_high_hz: 4000.0,
        }
    }
}

impl BandCutoffs {
    pub fn validate(&self, sample_rate: u32) -> Result<(), ConfigError> {
        let nyquist = sample_rate as f64 / 2.0;
        let ok = self.low_mid_hz.is_finite()
            && self.mid_high_hz.is_finite()
            && self.low_mid_hz > 0.0
            && self.low_mid_hz < self.mid_high_hz
            && self.mid_high_hz < nyquist;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::Cutoffs {
                low_mid: self.low_mid_hz,
                mid_high: self.mid_high_hz,
                nyquist,
            })
        }
    }
}

/// Low, mid and high copies of one signal, all the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bands {
    pub low: Vec<f32>,
    pub mid: Vec<f32>,
    pub high: Vec<f32>,
}

impl Bands {
    /// Length shared by all three bands, or `None` if they disagree.
    pub fn common_len(&self) -> Option<usize> {
        let n = self.low.len();
        (self.mid.len() == n && self.high.len() == n).then_some(n)
    }
}

/// Splits a signal into low/mid/high bands. Output must match the input length.
pub trait BandSplitter: Sync {
    fn split(&self, signal: &[f32], sample_rate: u32, cutoffs: BandCutoffs) -> Result<Bands>;
}

#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    fn lowpass(cutoff: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * cutoff / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * BUTTERWORTH_Q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_omega) / 2.0 / a0,
            b1: (1.0 - cos_omega) / a0,
            b2: (1.0 - cos_omega) / 2.0 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn highpass(cutoff: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * cutoff / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * BUTTERWORTH_Q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_omega) / 2.0 / a0,
            b1: -(1.0 + cos_omega) / a0,
            b2: (1.0 + cos_omega) / 2.0 / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Direct form I over a whole buffer, starting from silence.
    fn apply(&self, input: &[f32]) -> Vec<f32> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        input
            .iter()
            .map(|&x| {
                let x = x as f64;
                let y = self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y as f32
            })
            .collect()
    }
}

/// Biquad crossover: low = LP(low/mid), mid = HP(low/mid) then LP(mid/high),
/// high = HP(mid/high). The three chains run in parallel.
#[derive(Debug, Default, Clone, Copy)]
pub struct BiquadSplitter;

impl BandSplitter for BiquadSplitter {
    fn split(&self, signal: &[f32], sample_rate: u32, cutoffs: BandCutoffs) -> Result<Bands> {
        cutoffs.validate(sample_rate)?;
        let sr = sample_rate as f64;
        let low_pass = BiquadCoeffs::lowpass(cutoffs.low_mid_hz, sr);
        let mid_high_pass = BiquadCoeffs::highpass(cutoffs.low_mid_hz, sr);
        let mid_low_pass = BiquadCoeffs::lowpass(cutoffs.mid_high_hz, sr);
        let high_pass = BiquadCoeffs::highpass(cutoffs.mid_high_hz, sr);

        let (low, (mid, high)) = rayon::join(
            || low_pass.apply(signal),
            || {
                rayon::join(
                    || mid_low_pass.apply(&mid_high_pass.apply(signal)),
                    || high_pass.apply(signal),
                )
            },
        );

        log::debug!(
            "Split {} samples at {:.0} Hz / {:.0} Hz",
            signal.len(),
            cutoffs.low_mid_hz,
            cutoffs.mid_high_hz
        );
        Ok(Bands { low, mid, high })
    }
}
