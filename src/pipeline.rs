//! Full analysis passes over one decoded signal.
//!
//! A `Visualizer` is the session context: it owns the signal, admits one pass
//! at a time, and publishes each finished pass as a single `Rendering`. Readers
//! only ever see a whole committed rendering, never a cache under construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::analysis::cache::{Maxima, PowerCache};
use crate::analysis::power::{band_power, rms_power, PowerSample};
use crate::analysis::schedule::{WindowLayout, WindowSpec};
use crate::analysis::AnalysisMode;
use crate::audio::bands::{BandSplitter, BiquadSplitter};
use crate::error::PipelineError;
use crate::render::canvas::Canvas;
use crate::render::colormap::ColorMapper;

/// Windows processed between yield points.
pub const YIELD_EVERY: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Filtering,
    Processing,
}

/// Reported to the host at each yield point.
pub enum Progress<'a> {
    Filtering,
    Processing { fraction: f32, preview: &'a Canvas },
}

/// A finished pass: its cache and the canvas drawn from it at `offset`.
#[derive(Debug)]
pub struct Rendering {
    pub cache: Arc<PowerCache>,
    pub canvas: Canvas,
    pub offset: i64,
    pub generation: u64,
}

#[derive(Debug)]
pub enum PassOutcome {
    Committed(Arc<Rendering>),
    /// A newer generation was requested; nothing from this pass was kept.
    Superseded,
}

pub struct Visualizer {
    signal: Vec<f32>,
    splitter: Box<dyn BandSplitter + Send>,
    state: Mutex<PassState>,
    generation: AtomicU64,
    current: RwLock<Option<Arc<Rendering>>>,
}

/// Holds the pass slot; releases it back to `Idle` however the pass ends.
struct PassSlot<'a> {
    state: &'a Mutex<PassState>,
}

impl PassSlot<'_> {
    fn set(&self, next: PassState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl Drop for PassSlot<'_> {
    fn drop(&mut self) {
        self.set(PassState::Idle);
    }
}

impl Visualizer {
    /// Session over `signal`, splitting bands with biquad crossovers.
    pub fn new(signal: Vec<f32>) -> Self {
        Self::with_splitter(signal, Box::new(BiquadSplitter))
    }

    pub fn with_splitter(signal: Vec<f32>, splitter: Box<dyn BandSplitter + Send>) -> Self {
        Self {
            signal,
            splitter,
            state: Mutex::new(PassState::Idle),
            generation: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }

    pub fn state(&self) -> PassState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest committed rendering, if any pass has finished.
    pub fn current(&self) -> Option<Arc<Rendering>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invalidate the in-flight pass. It stops at its next yield point and
    /// its results are dropped; the committed rendering stays on display.
    pub fn supersede(&self) {
        let _current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Superseded passes before generation {}", generation);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    fn claim(&self, initial: PassState) -> Result<PassSlot<'_>, PipelineError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != PassState::Idle {
            return Err(PipelineError::PassInFlight);
        }
        *state = initial;
        Ok(PassSlot { state: &self.state })
    }

    /// Run a full pass and, unless superseded, publish it.
    ///
    /// Windows are painted provisionally with the previous pass's maxima as
    /// they are computed. Once every window is in, the true maxima are found
    /// and the whole canvas is drawn again; only that final canvas is committed.
    pub fn run(
        &self,
        spec: &WindowSpec,
        mode: AnalysisMode,
        offset: i64,
        mapper: &dyn ColorMapper,
        progress: &mut dyn FnMut(Progress<'_>),
    ) -> Result<PassOutcome, PipelineError> {
        let layout = WindowLayout::new(spec, self.signal.len())?;
        if let AnalysisMode::Bands(cutoffs) = mode {
            cutoffs.validate(spec.sample_rate)?;
        }

        let slot = self.claim(match mode {
            AnalysisMode::Mono => PassState::Processing,
            AnalysisMode::Bands(_) => PassState::Filtering,
        })?;
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let bands = match mode {
            AnalysisMode::Mono => None,
            AnalysisMode::Bands(cutoffs) => {
                progress(Progress::Filtering);
                let bands = self
                    .splitter
                    .split(&self.signal, spec.sample_rate, cutoffs)
                    .map_err(PipelineError::Splitter)?;
                match bands.common_len() {
                    Some(n) if n == self.signal.len() => {}
                    other => {
                        return Err(PipelineError::BandLengthMismatch {
                            expected: self.signal.len(),
                            got: other.unwrap_or(bands.low.len()),
                        })
                    }
                }
                if !self.is_current(ticket) {
                    return Ok(PassOutcome::Superseded);
                }
                slot.set(PassState::Processing);
                Some(bands)
            }
        };

        let provisional = self.provisional_maxima(bands.is_some());
        let mut cache = PowerCache::new(layout, spec.samples_per_beat, provisional);
        let mut preview = Canvas::new(cache.geometry());

        log::info!(
            "Pass {}: {} windows every {:.3} samples ({} per beat at {:.2} BPM), canvas {}x{}",
            ticket,
            layout.total_windows,
            layout.interval,
            spec.samples_per_beat,
            spec.bpm,
            preview.width(),
            preview.height(),
        );

        for index in 0..layout.total_windows {
            let start = layout.start_sample(index) as usize;
            let sample = match &bands {
                None => PowerSample::Mono(rms_power(&self.signal, start, spec.window_size)),
                Some(bands) => band_power(bands, start, spec.window_size),
            };
            cache.record(sample);
            cache.paint_window(&mut preview, index as usize, offset, mapper);

            if (index + 1) % YIELD_EVERY == 0 {
                if !self.is_current(ticket) {
                    log::debug!("Pass {} abandoned at window {}", ticket, index + 1);
                    return Ok(PassOutcome::Superseded);
                }
                progress(Progress::Processing {
                    fraction: (index + 1) as f32 / layout.total_windows as f32,
                    preview: &preview,
                });
                std::thread::yield_now();
            }
        }

        let maxima = cache.finalize_maxima();
        let canvas = cache.render(offset, mapper);
        progress(Progress::Processing {
            fraction: 1.0,
            preview: &canvas,
        });
        log::info!("Pass {} finished, maxima {:?}", ticket, maxima);

        self.commit(ticket, Arc::new(cache), canvas, offset)
    }

    fn commit(
        &self,
        ticket: u64,
        cache: Arc<PowerCache>,
        canvas: Canvas,
        offset: i64,
    ) -> Result<PassOutcome, PipelineError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(ticket) {
            log::debug!("Pass {} finished after being superseded, discarding", ticket);
            return Ok(PassOutcome::Superseded);
        }
        let rendering = Arc::new(Rendering {
            cache,
            canvas,
            offset,
            generation: ticket,
        });
        *current = Some(rendering.clone());
        Ok(PassOutcome::Committed(rendering))
    }

    /// Previous pass's maxima when it measured the same kind of power, else 1.0.
    fn provisional_maxima(&self, bands: bool) -> Maxima {
        let unit = if bands {
            Maxima::unit_bands()
        } else {
            Maxima::unit_mono()
        };
        self.current()
            .map(|r| r.cache.maxima())
            .filter(|m| m.same_kind(&unit))
            .unwrap_or(unit)
    }

    /// Draw the committed cache at another offset without publishing it.
    pub fn redraw(&self, offset: i64, mapper: &dyn ColorMapper) -> Option<Canvas> {
        self.current().map(|r| r.cache.render(offset, mapper))
    }

    /// Move the committed rendering to a new offset. Power values are reused as-is.
    pub fn reposition(&self, offset: i64, mapper: &dyn ColorMapper) -> Option<Arc<Rendering>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = current.as_ref()?;
        let rendering = Arc::new(Rendering {
            cache: previous.cache.clone(),
            canvas: previous.cache.render(offset, mapper),
            offset,
            generation: previous.generation,
        });
        *current = Some(rendering.clone());
        Some(rendering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::bands::{BandCutoffs, Bands};
    use crate::error::ConfigError;
    use crate::render::colormap::{ColorTable, PowerPalette};
    use std::sync::Barrier;

    /// 100 samples per window: 600 Hz, 60 BPM, 6 windows per beat.
    fn spec() -> WindowSpec {
        WindowSpec {
            bpm: 60.0,
            samples_per_beat: 6,
            sample_rate: 600,
            window_size: 100,
        }
    }

    fn gray() -> PowerPalette {
        PowerPalette::new(ColorTable::grayscale())
    }

    fn constant(amplitude: f32, windows: usize) -> Vec<f32> {
        vec![amplitude; windows * 100]
    }

    fn ignore(_: Progress<'_>) {}

    fn committed(outcome: PassOutcome) -> Arc<Rendering> {
        match outcome {
            PassOutcome::Committed(rendering) => rendering,
            PassOutcome::Superseded => panic!("pass was superseded"),
        }
    }

    struct FailingSplitter;

    impl BandSplitter for FailingSplitter {
        fn split(&self, _: &[f32], _: u32, _: BandCutoffs) -> anyhow::Result<Bands> {
            anyhow::bail!("filter exploded")
        }
    }

    /// Low = signal, mid = silence, high = twice the signal.
    struct ScaledSplitter;

    impl BandSplitter for ScaledSplitter {
        fn split(&self, signal: &[f32], _: u32, _: BandCutoffs) -> anyhow::Result<Bands> {
            Ok(Bands {
                low: signal.to_vec(),
                mid: vec![0.0; signal.len()],
                high: signal.iter().map(|s| s * 2.0).collect(),
            })
        }
    }

    struct ShortSplitter;

    impl BandSplitter for ShortSplitter {
        fn split(&self, signal: &[f32], _: u32, _: BandCutoffs) -> anyhow::Result<Bands> {
            let n = signal.len() / 2;
            Ok(Bands {
                low: vec![0.0; n],
                mid: vec![0.0; n],
                high: vec![0.0; n],
            })
        }
    }

    /// Parks inside `split` until the test lets it go.
    struct GatedSplitter {
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
    }

    impl BandSplitter for GatedSplitter {
        fn split(&self, signal: &[f32], sr: u32, cutoffs: BandCutoffs) -> anyhow::Result<Bands> {
            self.entered.wait();
            self.release.wait();
            ScaledSplitter.split(signal, sr, cutoffs)
        }
    }

    #[test]
    fn mono_pass_commits_final_rendering() {
        let signal: Vec<f32> = (0..10)
            .flat_map(|w| vec![w as f32 / 10.0; 100])
            .collect();
        let vis = Visualizer::new(signal);
        let rendering = committed(vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut ignore).unwrap());

        assert_eq!(rendering.cache.len(), 10);
        assert!(rendering.cache.is_finalized());
        assert_eq!(rendering.cache.maxima(), Maxima::Mono(0.9));
        assert_eq!(rendering.canvas, rendering.cache.render(0, &gray()));
        assert_eq!(rendering.canvas.get(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(vis.state(), PassState::Idle);
        assert!(Arc::ptr_eq(&vis.current().unwrap(), &rendering));
    }

    #[test]
    fn progress_arrives_every_thousand_windows() {
        let vis = Visualizer::new(constant(0.5, 2500));
        let mut fractions = Vec::new();
        vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut |p| {
            if let Progress::Processing { fraction, .. } = p {
                fractions.push(fraction);
            }
        })
        .unwrap();
        assert_eq!(fractions, vec![0.4, 0.8, 1.0]);
    }

    #[test]
    fn preview_uses_previous_maxima() {
        let vis = Visualizer::new(constant(0.5, 1500));
        let mut first_preview = None;
        vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut |p| {
            if let Progress::Processing { preview, .. } = p {
                first_preview.get_or_insert_with(|| preview.get(0, 0));
            }
        })
        .unwrap();
        // No earlier pass: provisional max is 1.0, so 0.5 is mid-gray.
        assert_eq!(first_preview.flatten(), Some([127, 127, 127, 255]));
        assert_eq!(vis.current().unwrap().canvas.get(0, 0), Some([255, 255, 255, 255]));

        let mut second_preview = None;
        vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut |p| {
            if let Progress::Processing { preview, .. } = p {
                second_preview.get_or_insert_with(|| preview.get(0, 0));
            }
        })
        .unwrap();
        assert_eq!(second_preview.flatten(), Some([255, 255, 255, 255]));
    }

    #[test]
    fn band_pass_normalizes_each_band() {
        let vis = Visualizer::with_splitter(constant(0.25, 8), Box::new(ScaledSplitter));
        let mut phases = Vec::new();
        let rendering = committed(
            vis.run(
                &spec(),
                AnalysisMode::Bands(BandCutoffs {
                    low_mid_hz: 50.0,
                    mid_high_hz: 200.0,
                }),
                0,
                &gray(),
                &mut |p| {
                    phases.push(match p {
                        Progress::Filtering => "filtering",
                        Progress::Processing { .. } => "processing",
                    })
                },
            )
            .unwrap(),
        );
        assert_eq!(phases, vec!["filtering", "processing"]);
        assert_eq!(rendering.cache.maxima(), Maxima::Bands([0.25, 1.0, 0.5]));
        assert_eq!(rendering.canvas.get(0, 0), Some([255, 0, 255, 255]));
    }

    #[test]
    fn invalid_spec_is_rejected_up_front() {
        let vis = Visualizer::new(constant(0.5, 4));
        let mut bad = spec();
        bad.bpm = 0.0;
        let err = vis.run(&bad, AnalysisMode::Mono, 0, &gray(), &mut ignore).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::Bpm(_))));

        let cutoffs = BandCutoffs {
            low_mid_hz: 100.0,
            mid_high_hz: 400.0,
        };
        let err = vis
            .run(&spec(), AnalysisMode::Bands(cutoffs), 0, &gray(), &mut ignore)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::Cutoffs { .. })));
        assert_eq!(vis.state(), PassState::Idle);
        assert!(vis.current().is_none());
    }

    #[test]
    fn splitter_failure_keeps_previous_rendering() {
        let vis = Visualizer::with_splitter(constant(0.5, 4), Box::new(FailingSplitter));
        let first = committed(vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut ignore).unwrap());

        let cutoffs = BandCutoffs {
            low_mid_hz: 50.0,
            mid_high_hz: 200.0,
        };
        let err = vis
            .run(&spec(), AnalysisMode::Bands(cutoffs), 0, &gray(), &mut ignore)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Splitter(_)));
        assert_eq!(vis.state(), PassState::Idle);
        assert!(Arc::ptr_eq(&vis.current().unwrap(), &first));
    }

    #[test]
    fn short_bands_are_rejected() {
        let vis = Visualizer::with_splitter(constant(0.5, 4), Box::new(ShortSplitter));
        let cutoffs = BandCutoffs {
            low_mid_hz: 50.0,
            mid_high_hz: 200.0,
        };
        let err = vis
            .run(&spec(), AnalysisMode::Bands(cutoffs), 0, &gray(), &mut ignore)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BandLengthMismatch {
                expected: 400,
                got: 200
            }
        ));
    }

    #[test]
    fn second_pass_is_refused_while_one_is_running() {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let vis = Visualizer::with_splitter(
            constant(0.5, 8),
            Box::new(GatedSplitter {
                entered: entered.clone(),
                release: release.clone(),
            }),
        );
        let cutoffs = BandCutoffs {
            low_mid_hz: 50.0,
            mid_high_hz: 200.0,
        };

        std::thread::scope(|scope| {
            let background = scope.spawn(|| {
                vis.run(&spec(), AnalysisMode::Bands(cutoffs), 0, &gray(), &mut ignore)
            });

            entered.wait();
            assert_eq!(vis.state(), PassState::Filtering);
            let err = vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut ignore).unwrap_err();
            assert!(matches!(err, PipelineError::PassInFlight));
            release.wait();

            let outcome = background.join().unwrap().unwrap();
            assert!(matches!(outcome, PassOutcome::Committed(_)));
        });
        assert_eq!(vis.state(), PassState::Idle);
    }

    #[test]
    fn superseded_pass_is_discarded() {
        let vis = Visualizer::new(constant(0.5, 3000));
        let first = committed(vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut ignore).unwrap());

        let mut yields = 0;
        let outcome = vis
            .run(&spec(), AnalysisMode::Mono, 5, &gray(), &mut |_| {
                yields += 1;
                vis.supersede();
            })
            .unwrap();
        assert!(matches!(outcome, PassOutcome::Superseded));
        // Stopped at the yield point after the one that superseded it.
        assert_eq!(yields, 1);
        assert!(Arc::ptr_eq(&vis.current().unwrap(), &first));
        assert_eq!(vis.state(), PassState::Idle);
    }

    #[test]
    fn supersede_during_final_render_blocks_commit() {
        let vis = Visualizer::new(constant(0.5, 10));
        let outcome = vis
            .run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut |p| {
                if let Progress::Processing { fraction, .. } = p {
                    if fraction == 1.0 {
                        vis.supersede();
                    }
                }
            })
            .unwrap();
        assert!(matches!(outcome, PassOutcome::Superseded));
        assert!(vis.current().is_none());
    }

    #[test]
    fn offset_changes_reuse_the_cache() {
        let signal: Vec<f32> = (0..64).flat_map(|w| vec![(w % 5) as f32; 100]).collect();
        let vis = Visualizer::new(signal);
        let first = committed(vis.run(&spec(), AnalysisMode::Mono, 0, &gray(), &mut ignore).unwrap());
        let before = (*first.cache).clone();

        let shifted = vis.redraw(3, &gray()).unwrap();
        assert_ne!(shifted, first.canvas);
        assert_eq!(vis.redraw(0, &gray()).unwrap(), first.canvas);

        let moved = vis.reposition(3, &gray()).unwrap();
        assert_eq!(moved.offset, 3);
        assert_eq!(moved.canvas, shifted);
        assert!(Arc::ptr_eq(&moved.cache, &first.cache));
        assert_eq!(*moved.cache, before);
    }

    #[test]
    fn redraw_without_a_pass_is_none() {
        let vis = Visualizer::new(Vec::new());
        assert!(vis.redraw(0, &gray()).is_none());
        assert!(vis.reposition(1, &gray()).is_none());
    }
}
