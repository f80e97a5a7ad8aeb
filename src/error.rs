use thiserror::Error;

/// Rejected analysis parameters. Raised before any pass state is created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tempo must be a positive, finite BPM (got {0})")]
    Bpm(f64),
    #[error("samples per beat must be greater than zero")]
    SamplesPerBeat,
    #[error("sample rate must be greater than zero")]
    SampleRate,
    #[error("window size must be greater than zero")]
    WindowSize,
    #[error("band cutoffs must satisfy 0 < low/mid ({low_mid} Hz) < mid/high ({mid_high} Hz) < Nyquist ({nyquist} Hz)")]
    Cutoffs {
        low_mid: f64,
        mid_high: f64,
        nyquist: f64,
    },
    #[error("channel {channel} requested but the file only has {available}")]
    Channel { channel: usize, available: usize },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("an analysis pass is already running")]
    PassInFlight,
    #[error("band splitting failed")]
    Splitter(#[source] anyhow::Error),
    #[error("band splitter returned bands of {got} samples for a {expected}-sample signal")]
    BandLengthMismatch { expected: usize, got: usize },
}
