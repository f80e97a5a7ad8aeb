use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::ConfigError;

/// One decoded channel. Only a single channel is ever analyzed.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source file
    pub channels: usize,
}

impl AudioData {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

pub fn decode_channel(path: &Path, channel: usize) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    if channel >= channels {
        return Err(ConfigError::Channel {
            channel,
            available: channels,
        }
        .into());
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::debug!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        samples.extend(extract_channel(sample_buf.samples(), channels, channel));
    }

    log::info!(
        "Decoded channel {} of {}: {} samples, {}Hz, {:.1}s",
        channel,
        channels,
        samples.len(),
        sample_rate,
        samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

/// Pick one channel out of interleaved frames.
fn extract_channel(interleaved: &[f32], channels: usize, channel: usize) -> impl Iterator<Item = f32> + '_ {
    interleaved
        .chunks_exact(channels)
        .map(move |frame| frame[channel])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_requested_channel() {
        let interleaved = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let left: Vec<f32> = extract_channel(&interleaved, 2, 0).collect();
        let right: Vec<f32> = extract_channel(&interleaved, 2, 1).collect();
        assert_eq!(left, vec![0.1, 0.2, 0.3]);
        assert_eq!(right, vec![-0.1, -0.2, -0.3]);
    }

    #[test]
    fn mono_passes_through() {
        let samples = [0.5, 0.25, 0.0];
        let out: Vec<f32> = extract_channel(&samples, 1, 0).collect();
        assert_eq!(out, samples.to_vec());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = decode_channel(Path::new("/nonexistent/track.wav"), 0)
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to open audio file"));
    }
}
