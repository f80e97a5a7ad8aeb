mod cli;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use cli::{Cli, ModeArg};
use mortonbeat::analysis::schedule::{offset_from_beats, offset_from_seconds, WindowSpec};
use mortonbeat::analysis::AnalysisMode;
use mortonbeat::audio;
use mortonbeat::audio::bands::BandCutoffs;
use mortonbeat::encode;
use mortonbeat::encode::json::CacheReport;
use mortonbeat::pipeline::{PassOutcome, Progress, Visualizer};
use mortonbeat::render::colormap::{ColorTable, PowerPalette};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(path) = config::find_config(cli.config.as_deref()) {
        match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                apply_config(&mut cli, cfg);
            }
            Err(err) => log::warn!("{:#}", err),
        }
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let palette = ColorTable::by_name(&cli.colormap)
        .map(PowerPalette::new)
        .with_context(|| format!("Unknown colour map '{}' (try magma or gray)", cli.colormap))?;

    log::info!("mortonbeat - Z-order rhythm maps");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());

    // 1. Decode the analyzed channel
    let decoded = audio::decode::decode_channel(input, cli.channel)?;
    if decoded.channels > 1 {
        log::info!(
            "Analyzing channel {} of {} ({:.1}s)",
            cli.channel,
            decoded.channels,
            decoded.duration()
        );
    }

    // 2. Tempo
    let bpm = match cli.bpm {
        Some(bpm) => bpm,
        None => {
            log::info!("No BPM given, estimating...");
            audio::tempo::estimate(&decoded.samples, decoded.sample_rate).bpm
        }
    };

    let spec = WindowSpec {
        bpm,
        samples_per_beat: cli.samples_per_beat,
        sample_rate: decoded.sample_rate,
        window_size: cli.window_size,
    };
    let mode = match cli.mode {
        ModeArg::Mono => AnalysisMode::Mono,
        ModeArg::Rgb => AnalysisMode::Bands(BandCutoffs {
            low_mid_hz: cli.low_mid,
            mid_high_hz: cli.mid_high,
        }),
    };
    let offset = match (cli.offset_beats, cli.offset_seconds) {
        (Some(beats), _) => offset_from_beats(beats, cli.samples_per_beat),
        (None, Some(seconds)) => offset_from_seconds(seconds, bpm, cli.samples_per_beat),
        (None, None) => cli.offset,
    };
    log::info!(
        "Tempo {:.2} BPM, {} windows/beat, window {} samples, offset {} windows, mode {:?}",
        bpm,
        cli.samples_per_beat,
        cli.window_size,
        offset,
        cli.mode
    );

    // 3. Full pass
    let visualizer = Visualizer::new(decoded.samples);

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")?
            .progress_chars("=>-"),
    );

    let outcome = visualizer.run(&spec, mode, offset, &palette, &mut |progress| match progress {
        Progress::Filtering => pb.set_message("filtering bands"),
        Progress::Processing { fraction, .. } => {
            pb.set_message("measuring windows");
            pb.set_position((fraction * 1000.0) as u64);
        }
    })?;
    pb.finish_with_message("analysis complete");

    let rendering = match outcome {
        PassOutcome::Committed(rendering) => rendering,
        PassOutcome::Superseded => anyhow::bail!("Analysis pass was superseded"),
    };

    // 4. Images
    encode::png::write_png(&rendering.canvas, &cli.output)?;
    for &extra in &cli.extra_offsets {
        if let Some(canvas) = visualizer.redraw(extra, &palette) {
            encode::png::write_png(&canvas, &offset_output_path(&cli.output, extra))?;
        }
    }

    if let Some(ref path) = cli.dump_json {
        let report = CacheReport {
            source: input.display().to_string(),
            bpm,
            window_size: cli.window_size,
            mode: match cli.mode {
                ModeArg::Mono => "mono",
                ModeArg::Rgb => "rgb",
            },
            offset,
            cache: &rendering.cache,
        };
        encode::json::write_report(&report, path)?;
    }

    // 5. Lookups
    let cache = &rendering.cache;
    for &seconds in &cli.locate_time {
        match cache.coordinate_for_time(seconds, offset) {
            Some((x, y)) => println!("{:.3}s -> pixel {}:{}", seconds, x, y),
            None => println!("{:.3}s -> off canvas", seconds),
        }
    }
    for &(x, y) in &cli.locate_pixel {
        match cache.time_for_coordinate(x, y, offset) {
            Some(seconds) => println!("pixel {}:{} -> {:.3}s", x, y, seconds),
            None => println!("pixel {}:{} -> no window", x, y),
        }
    }

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

/// Config values apply only where the CLI is still at its default.
fn apply_config(cli: &mut Cli, cfg: config::Config) {
    let analysis = cfg.analysis;
    if cli.bpm.is_none() { cli.bpm = analysis.bpm; }
    if cli.samples_per_beat == 64 { cli.samples_per_beat = analysis.samples_per_beat; }
    if cli.window_size == 1024 { cli.window_size = analysis.window_size; }
    if cli.low_mid == 250.0 { cli.low_mid = analysis.low_mid_hz; }
    if cli.mid_high == 4000.0 { cli.mid_high = analysis.mid_high_hz; }
    if cli.channel == 0 { cli.channel = analysis.channel; }
    if cli.mode == ModeArg::Mono {
        match ModeArg::from_str(&analysis.mode, true) {
            Ok(mode) => cli.mode = mode,
            Err(_) => log::warn!("Ignoring unknown mode '{}' in config", analysis.mode),
        }
    }
    if cli.colormap == "magma" { cli.colormap = cfg.render.colormap; }
    if cli.output == Path::new("mortonbeat.png") {
        if let Some(output) = cfg.render.output {
            cli.output = output;
        }
    }
}

/// `track.png` with offset -8 becomes `track_offset-8.png`.
fn offset_output_path(output: &Path, offset: i64) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mortonbeat".into());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".into());
    output.with_file_name(format!("{}_offset{:+}.{}", stem, offset, ext))
}
