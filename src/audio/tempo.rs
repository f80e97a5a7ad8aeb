//! Tempo estimate used when no BPM is configured.
//!
//! Spectral-flux onsets, then the median inter-onset interval in the
//! 60-200 BPM range. Good enough to seed the window cadence; users with a
//! known tempo should pass it explicitly.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 1024;
pub const FALLBACK_BPM: f64 = 120.0;

#[derive(Clone, Debug)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub onset_times: Vec<f32>,
    /// False when too few onsets were found and `FALLBACK_BPM` was used
    pub detected: bool,
}

pub fn estimate(samples: &[f32], sample_rate: u32) -> TempoEstimate {
    let flux = spectral_flux(samples, sample_rate);
    let onset_times = detect_onsets(&flux);
    let bpm = tempo_from_onsets(&onset_times);

    match bpm {
        Some(bpm) => log::info!(
            "Tempo: {:.2} BPM from {} onsets",
            bpm,
            onset_times.len()
        ),
        None => log::warn!(
            "Tempo: only {} usable onsets, falling back to {} BPM",
            onset_times.len(),
            FALLBACK_BPM
        ),
    }

    TempoEstimate {
        bpm: bpm.unwrap_or(FALLBACK_BPM),
        detected: bpm.is_some(),
        onset_times,
    }
}

/// `(time, flux)` per hop.
fn spectral_flux(samples: &[f32], sample_rate: u32) -> Vec<(f32, f32)> {
    if samples.len() < FFT_SIZE {
        return Vec::new();
    }
    let hann = hann_window(FFT_SIZE);
    let frame_count = (samples.len() - FFT_SIZE) / HOP_SIZE + 1;

    let spectra: Vec<Vec<f32>> = (0..frame_count)
        .into_par_iter()
        .map(|frame| {
            let pos = frame * HOP_SIZE;
            let mut buffer: Vec<Complex<f32>> = samples[pos..pos + FFT_SIZE]
                .iter()
                .zip(&hann)
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            // Per-thread planner (rayon-safe)
            let mut planner = FftPlanner::<f32>::new();
            planner.plan_fft_forward(FFT_SIZE).process(&mut buffer);
            buffer[..FFT_SIZE / 2].iter().map(|c| c.norm()).collect()
        })
        .collect();

    let silent = vec![0.0f32; FFT_SIZE / 2];
    spectra
        .iter()
        .enumerate()
        .map(|(frame, magnitudes)| {
            let prev = if frame == 0 { &silent } else { &spectra[frame - 1] };
            let flux: f32 = magnitudes
                .iter()
                .zip(prev)
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum();
            ((frame * HOP_SIZE) as f32 / sample_rate as f32, flux)
        })
        .collect()
}

/// Local peaks above an adaptive threshold, at least 100 ms apart.
fn detect_onsets(flux: &[(f32, f32)]) -> Vec<f32> {
    let window = 20;
    let mut onsets: Vec<f32> = Vec::new();

    for i in 0..flux.len() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(flux.len());
        let local_mean: f32 =
            flux[start..end].iter().map(|(_, f)| f).sum::<f32>() / (end - start) as f32;
        let threshold = local_mean * 1.5 + 0.01;

        let (time, value) = flux[i];
        if value <= threshold {
            continue;
        }
        let is_peak = (i == 0 || value >= flux[i - 1].1)
            && (i + 1 == flux.len() || value >= flux[i + 1].1);
        let far_enough = onsets.last().map_or(true, |&last| time - last > 0.1);
        if is_peak && far_enough {
            onsets.push(time);
        }
    }

    onsets
}

/// Median of the inter-onset intervals between 0.3 s and 1.0 s.
fn tempo_from_onsets(onsets: &[f32]) -> Option<f64> {
    let mut intervals: Vec<f32> = onsets
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();
    if intervals.is_empty() {
        return None;
    }
    intervals.sort_by(f32::total_cmp);
    let median = intervals[intervals.len() / 2];
    Some(60.0 / median as f64)
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    /// Decaying 1 kHz blips every `period` seconds.
    fn click_track(period: f64, seconds: f64) -> Vec<f32> {
        let len = (seconds * SR as f64) as usize;
        let step = (period * SR as f64) as usize;
        let mut samples = vec![0.0f32; len];
        for start in (0..len).step_by(step) {
            for i in 0..400.min(len - start) {
                let t = i as f32 / SR as f32;
                samples[start + i] =
                    (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * (-(i as f32) / 80.0).exp();
            }
        }
        samples
    }

    #[test]
    fn finds_tempo_of_click_track() {
        let estimate = estimate(&click_track(0.5, 12.0), SR);
        assert!(estimate.detected);
        assert!((estimate.bpm - 120.0).abs() < 10.0, "bpm {}", estimate.bpm);
        assert!(estimate.onset_times.len() >= 20);
    }

    #[test]
    fn silence_falls_back() {
        let estimate = estimate(&vec![0.0; SR as usize * 4], SR);
        assert!(!estimate.detected);
        assert_eq!(estimate.bpm, FALLBACK_BPM);
    }

    #[test]
    fn short_input_has_no_flux() {
        assert!(spectral_flux(&[0.0; 100], SR).is_empty());
    }

    #[test]
    fn median_ignores_implausible_intervals() {
        let onsets = [0.0, 0.5, 1.0, 1.05, 1.55, 4.0];
        // 0.05 and 2.45 are dropped; remaining intervals are all 0.5.
        let bpm = tempo_from_onsets(&onsets).unwrap();
        assert!((bpm - 120.0).abs() < 1e-3);
        assert_eq!(tempo_from_onsets(&[1.0]), None);
    }
}
