//! Power values of one full pass and their projection onto the canvas.
//!
//! A cache is filled once by the pipeline, finalized, and then only read:
//! changing the curve offset re-renders from here without touching audio.

use serde::Serialize;

use super::morton::{self, CanvasGeometry};
use super::power::PowerSample;
use super::schedule::WindowLayout;
use crate::render::canvas::Canvas;
use crate::render::colormap::ColorMapper;

/// Normalization ceiling: one for mono, one per band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Maxima {
    Mono(f32),
    Bands([f32; 3]),
}

impl Maxima {
    pub fn unit_mono() -> Self {
        Maxima::Mono(1.0)
    }

    pub fn unit_bands() -> Self {
        Maxima::Bands([1.0; 3])
    }

    pub fn same_kind(&self, other: &Maxima) -> bool {
        matches!(
            (self, other),
            (Maxima::Mono(_), Maxima::Mono(_)) | (Maxima::Bands(_), Maxima::Bands(_))
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PowerCache {
    geometry: CanvasGeometry,
    layout: WindowLayout,
    samples_per_beat: u32,
    maxima: Maxima,
    finalized: bool,
    samples: Vec<PowerSample>,
}

impl PowerCache {
    /// Empty cache that normalizes with `provisional` until finalized.
    pub fn new(layout: WindowLayout, samples_per_beat: u32, provisional: Maxima) -> Self {
        Self {
            geometry: CanvasGeometry::for_windows(layout.total_windows),
            layout,
            samples_per_beat,
            maxima: provisional,
            finalized: false,
            samples: Vec::with_capacity(layout.total_windows as usize),
        }
    }

    pub fn record(&mut self, sample: PowerSample) {
        debug_assert!(!self.finalized, "record after finalize");
        self.samples.push(sample);
    }

    /// Replace the provisional maxima with the true ones.
    ///
    /// A maximum of exactly zero (silence) becomes 1.0 so normalization never divides by zero.
    pub fn finalize_maxima(&mut self) -> Maxima {
        let maxima = match self.maxima {
            Maxima::Mono(_) => {
                let max = self
                    .samples
                    .iter()
                    .filter_map(|s| match s {
                        PowerSample::Mono(v) => Some(*v),
                        PowerSample::Bands { .. } => None,
                    })
                    .fold(0.0f32, f32::max);
                Maxima::Mono(nonzero(max))
            }
            Maxima::Bands(_) => {
                let mut max = [0.0f32; 3];
                for sample in &self.samples {
                    if let PowerSample::Bands { low, mid, high } = *sample {
                        max[0] = max[0].max(low);
                        max[1] = max[1].max(mid);
                        max[2] = max[2].max(high);
                    }
                }
                Maxima::Bands(max.map(nonzero))
            }
        };
        self.maxima = maxima;
        self.finalized = true;
        log::debug!("Finalized maxima over {} windows: {:?}", self.samples.len(), maxima);
        maxima
    }

    /// Paint a single recorded window onto `canvas` with the current maxima.
    pub fn paint_window(
        &self,
        canvas: &mut Canvas,
        index: usize,
        offset: i64,
        mapper: &dyn ColorMapper,
    ) {
        let Some(sample) = self.samples.get(index) else {
            return;
        };
        if let Some((x, y)) = self.geometry.locate((index as i64).saturating_add(offset)) {
            canvas.put(x, y, mapper.color(sample, &self.maxima));
        }
    }

    /// Project every recorded window onto a fresh canvas. Windows shifted off
    /// the canvas, including to negative indices, are skipped.
    pub fn render(&self, offset: i64, mapper: &dyn ColorMapper) -> Canvas {
        let mut canvas = Canvas::new(self.geometry);
        for index in 0..self.samples.len() {
            self.paint_window(&mut canvas, index, offset, mapper);
        }
        canvas
    }

    /// Pixel showing the window playing at `seconds`.
    pub fn coordinate_for_time(&self, seconds: f64, offset: i64) -> Option<(u32, u32)> {
        let index = self.layout.window_at_time(seconds)?;
        self.geometry.locate((index as i64).saturating_add(offset))
    }

    /// Start time of the window drawn at `(x, y)`.
    pub fn time_for_coordinate(&self, x: u32, y: u32, offset: i64) -> Option<f64> {
        if !self.geometry.contains(x, y) {
            return None;
        }
        let index = (morton::index_of(x, y) as i64).checked_sub(offset)?;
        if index < 0 {
            return None;
        }
        self.layout.time_of_window(index as u64)
    }

    pub fn samples(&self) -> &[PowerSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn maxima(&self) -> Maxima {
        self.maxima
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn geometry(&self) -> CanvasGeometry {
        self.geometry
    }

    pub fn layout(&self) -> &WindowLayout {
        &self.layout
    }

    pub fn samples_per_beat(&self) -> u32 {
        self.samples_per_beat
    }
}

fn nonzero(max: f32) -> f32 {
    if max == 0.0 {
        1.0
    } else {
        max
    }
}
