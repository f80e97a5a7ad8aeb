use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Single RMS value per window through the colour map
    Mono,
    /// Low/mid/high band RMS as red/green/blue
    Rgb,
}

#[derive(Parser, Debug)]
#[command(
    name = "mortonbeat",
    about = "Tempo-aligned audio energy drawn along a Z-order curve"
)]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output PNG file
    #[arg(short, long, default_value = "mortonbeat.png")]
    pub output: PathBuf,

    /// Track tempo in BPM. Estimated from the audio when omitted.
    #[arg(short, long)]
    pub bpm: Option<f64>,

    /// Analysis windows per beat (a power of two lines up best)
    #[arg(short, long, default_value_t = 64)]
    pub samples_per_beat: u32,

    /// RMS window length in samples
    #[arg(short, long, default_value_t = 1024)]
    pub window_size: usize,

    /// Analysis mode
    #[arg(short, long, value_enum, default_value_t = ModeArg::Mono)]
    pub mode: ModeArg,

    /// Low/mid crossover in Hz (rgb mode)
    #[arg(long, default_value_t = 250.0)]
    pub low_mid: f64,

    /// Mid/high crossover in Hz (rgb mode)
    #[arg(long, default_value_t = 4000.0)]
    pub mid_high: f64,

    /// Curve offset in windows (may be negative)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,

    /// Curve offset in beats; overrides --offset
    #[arg(long, allow_negative_numbers = true, conflicts_with = "offset_seconds")]
    pub offset_beats: Option<f64>,

    /// Curve offset in seconds; overrides --offset
    #[arg(long, allow_negative_numbers = true)]
    pub offset_seconds: Option<f64>,

    /// Channel to analyze
    #[arg(long, default_value_t = 0)]
    pub channel: usize,

    /// Colour map for mono mode (magma, gray)
    #[arg(long, default_value = "magma")]
    pub colormap: String,

    /// Additional offsets (in windows) to render from the same analysis
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub extra_offsets: Vec<i64>,

    /// Write the power cache and analysis parameters as JSON
    #[arg(long)]
    pub dump_json: Option<PathBuf>,

    /// Print the pixel showing each of these times (seconds)
    #[arg(long, value_delimiter = ',')]
    pub locate_time: Vec<f64>,

    /// Print the time drawn at each of these pixels ("x:y")
    #[arg(long, value_parser = parse_pixel)]
    pub locate_pixel: Vec<(u32, u32)>,

    /// Config file (defaults to mortonbeat.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_pixel(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s
        .split_once(':')
        .ok_or_else(|| format!("expected x:y, got '{}'", s))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in '{}': {}", s, e))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in '{}': {}", s, e))?;
    Ok((x, y))
}
