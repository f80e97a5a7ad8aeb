use serde::Serialize;

use crate::error::ConfigError;

/// Immutable per-run analysis cadence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSpec {
    pub bpm: f64,
    pub samples_per_beat: u32,
    pub sample_rate: u32,
    /// RMS aperture in samples
    pub window_size: usize,
}

impl WindowSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::WindowSize);
        }
        interval_samples(self.bpm, self.samples_per_beat, self.sample_rate).map(|_| ())
    }

    pub fn interval(&self) -> Result<f64, ConfigError> {
        interval_samples(self.bpm, self.samples_per_beat, self.sample_rate)
    }
}

/// Samples between consecutive window starts. Deliberately left fractional.
pub fn interval_samples(bpm: f64, samples_per_beat: u32, sample_rate: u32) -> Result<f64, ConfigError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(ConfigError::Bpm(bpm));
    }
    if samples_per_beat == 0 {
        return Err(ConfigError::SamplesPerBeat);
    }
    if sample_rate == 0 {
        return Err(ConfigError::SampleRate);
    }
    Ok(sample_rate as f64 / ((bpm / 60.0) * samples_per_beat as f64))
}

/// First sample of window `i`.
///
/// Always `round(i * interval)` from scratch: summing a rounded interval
/// drifts further off the beat grid with every window.
pub fn start_sample_of(i: u64, interval: f64) -> u64 {
    (i as f64 * interval).round() as u64
}

pub fn total_windows(signal_len: usize, interval: f64) -> u64 {
    (signal_len as f64 / interval).floor() as u64
}

/// Convert a beat count into the canonical window-count offset.
pub fn offset_from_beats(beats: f64, samples_per_beat: u32) -> i64 {
    (beats * samples_per_beat as f64).round() as i64
}

/// Convert seconds into the canonical window-count offset.
pub fn offset_from_seconds(seconds: f64, bpm: f64, samples_per_beat: u32) -> i64 {
    offset_from_beats(seconds * bpm / 60.0, samples_per_beat)
}

/// Window grid of one decoded signal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WindowLayout {
    pub interval: f64,
    pub total_windows: u64,
    pub sample_rate: u32,
    pub signal_len: usize,
}

impl WindowLayout {
    pub fn new(spec: &WindowSpec, signal_len: usize) -> Result<Self, ConfigError> {
        spec.validate()?;
        let interval = spec.interval()?;
        Ok(Self {
            interval,
            total_windows: total_windows(signal_len, interval),
            sample_rate: spec.sample_rate,
            signal_len,
        })
    }

    pub fn duration(&self) -> f64 {
        self.signal_len as f64 / self.sample_rate as f64
    }

    pub fn start_sample(&self, index: u64) -> u64 {
        start_sample_of(index, self.interval)
    }

    /// Window covering `seconds`, or `None` outside `[0, duration)` or past the last window.
    pub fn window_at_time(&self, seconds: f64) -> Option<u64> {
        if !seconds.is_finite() || seconds < 0.0 || seconds >= self.duration() {
            return None;
        }
        let index = (seconds * self.sample_rate as f64 / self.interval).floor() as u64;
        (index < self.total_windows).then_some(index)
    }

    pub fn time_of_window(&self, index: u64) -> Option<f64> {
        (index < self.total_windows)
            .then(|| self.start_sample(index) as f64 / self.sample_rate as f64)
    }
}
