use serde::Serialize;

use crate::audio::bands::Bands;

/// Energy of one window: a single RMS value, or one per frequency band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PowerSample {
    Mono(f32),
    Bands { low: f32, mid: f32, high: f32 },
}

/// RMS of `samples[start..start + window_size]`, truncated at the end of the buffer.
///
/// The mean divides by the samples actually present. A window that starts at or
/// past the end has no samples and reports 0.
pub fn rms_power(samples: &[f32], start: usize, window_size: usize) -> f32 {
    let end = start.saturating_add(window_size).min(samples.len());
    if start >= end {
        return 0.0;
    }
    let window = &samples[start..end];
    let sum_sq: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / window.len() as f64).sqrt() as f32
}

/// Independent RMS per band over the same window.
pub fn band_power(bands: &Bands, start: usize, window_size: usize) -> PowerSample {
    PowerSample::Bands {
        low: rms_power(&bands.low, start, window_size),
        mid: rms_power(&bands.mid, start, window_size),
        high: rms_power(&bands.high, start, window_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_and_silent_windows() {
        assert_eq!(rms_power(&[1.0, 1.0, 1.0, 1.0], 0, 4), 1.0);
        assert_eq!(rms_power(&[0.0, 0.0, 0.0, 0.0], 0, 4), 0.0);
        assert_eq!(rms_power(&[-1.0, 1.0, -1.0, 1.0], 0, 4), 1.0);
    }

    #[test]
    fn rms_of_mixed_values() {
        let rms = rms_power(&[3.0, 4.0], 0, 2);
        assert!((rms - 12.5f32.sqrt()).abs() < 1e-6);
        assert!((rms - 3.5355).abs() < 1e-4);
    }

    #[test]
    fn truncated_window_divides_by_available_samples() {
        // Only index 1 is inside the buffer, so the mean is over one sample.
        assert_eq!(rms_power(&[1.0, 1.0], 1, 4), 1.0);
        let rms = rms_power(&[0.0, 0.0, 2.0], 2, 100);
        assert_eq!(rms, 2.0);
    }

    #[test]
    fn window_past_the_end_is_zero() {
        assert_eq!(rms_power(&[1.0, 1.0], 2, 4), 0.0);
        assert_eq!(rms_power(&[1.0, 1.0], 10, 4), 0.0);
        assert_eq!(rms_power(&[], 0, 4), 0.0);
        assert_eq!(rms_power(&[1.0], usize::MAX, 4), 0.0);
    }

    #[test]
    fn bands_are_measured_independently() {
        let bands = Bands {
            low: vec![1.0; 8],
            mid: vec![0.0; 8],
            high: vec![3.0, 4.0, 3.0, 4.0, 3.0, 4.0, 3.0, 4.0],
        };
        match band_power(&bands, 2, 4) {
            PowerSample::Bands { low, mid, high } => {
                assert_eq!(low, 1.0);
                assert_eq!(mid, 0.0);
                assert!((high - 12.5f32.sqrt()).abs() < 1e-6);
            }
            other => panic!("expected band power, got {:?}", other),
        }
    }
}
