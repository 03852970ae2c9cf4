//! The beat-grid time-warping engine.
//!
//! [`warp`] cuts the input at the source beats, stretches every beat
//! interval so it fills the matching target interval, and stitches the
//! results back together with short crossfades:
//!
//! ```text
//! source/target grids ─► planner ─► jobs ─► worker pool (StretchBackend)
//!                                                │ in job order
//!                                                ▼
//!                       PeakNormalizer ◄─ OverlapAddAssembler
//! ```

pub mod assembler;
pub mod normalize;
pub mod planner;
mod pool;

pub use assembler::{apply_edge_fades, OverlapAddAssembler};
pub use normalize::PeakNormalizer;
pub use planner::{
    clean_grids, plan, CleanedGrids, DegenerateSegment, SegmentJob, SegmentPlan,
    DUPLICATE_EPSILON, MIN_BEATS,
};

use serde::{Deserialize, Serialize};

use crate::core::{AudioBuffer, Sample};
use crate::error::WarpError;
use crate::grid::BeatGrid;
use crate::stretch::{clamp_rate, BackendKind, StretchBackend};

/// Longest allowed crossfade between segments.
pub const MAX_CROSSFADE_MS: f64 = 20.0;

const DEFAULT_CROSSFADE_MS: f64 = 10.0;
const DEFAULT_MIN_SEGMENT_MS: f64 = 40.0;
const DEFAULT_HEADROOM_DB: f64 = 1.0;

/// Options for a single warp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpOptions {
    /// Stretch backend selection.
    pub backend: BackendKind,
    /// Crossfade between adjacent segments in ms, clamped to
    /// [0, [`MAX_CROSSFADE_MS`]].
    pub crossfade_ms: f64,
    /// Source segments shorter than this (ms) are passed through unstretched.
    pub min_segment_ms: f64,
    /// Output peak ceiling in dB below full scale; `None` disables it.
    pub headroom_db: Option<f64>,
    /// Stretch worker threads; 0 uses one per available core.
    pub workers: usize,
}

impl Default for WarpOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            min_segment_ms: DEFAULT_MIN_SEGMENT_MS,
            headroom_db: Some(DEFAULT_HEADROOM_DB),
            workers: 0,
        }
    }
}

impl WarpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the crossfade, clamped to [0, 20] ms.
    pub fn with_crossfade_ms(mut self, crossfade_ms: f64) -> Self {
        self.crossfade_ms = if crossfade_ms.is_nan() {
            0.0
        } else {
            crossfade_ms.clamp(0.0, MAX_CROSSFADE_MS)
        };
        self
    }

    pub fn with_min_segment_ms(mut self, min_segment_ms: f64) -> Self {
        self.min_segment_ms = min_segment_ms;
        self
    }

    pub fn with_headroom_db(mut self, headroom_db: Option<f64>) -> Self {
        self.headroom_db = headroom_db;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Crossfade length in samples at `sample_rate`.
    pub fn crossfade_samples(&self, sample_rate: u32) -> usize {
        let ms = self.crossfade_ms.clamp(0.0, MAX_CROSSFADE_MS);
        (ms / 1000.0 * sample_rate as f64) as usize
    }

    /// Minimum stretchable source segment in samples at `sample_rate`.
    pub fn min_segment_samples(&self, sample_rate: u32) -> usize {
        (self.min_segment_ms.max(1.0) / 1000.0 * sample_rate as f64) as usize
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), WarpError> {
        if !self.crossfade_ms.is_finite() {
            return Err(WarpError::InvalidOptions(format!(
                "crossfade must be finite, got {}",
                self.crossfade_ms
            )));
        }
        if !self.min_segment_ms.is_finite() || self.min_segment_ms < 0.0 {
            return Err(WarpError::InvalidOptions(format!(
                "minimum segment length must be finite and non-negative, got {}",
                self.min_segment_ms
            )));
        }
        if let Some(headroom) = self.headroom_db {
            if !headroom.is_finite() || headroom < 0.0 {
                return Err(WarpError::InvalidOptions(format!(
                    "headroom must be finite and non-negative, got {} dB",
                    headroom
                )));
            }
        }
        Ok(())
    }
}

/// Per-run segment counters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WarpStats {
    /// Segments run through the stretch backend.
    pub stretched: usize,
    /// Segments below the minimum length, copied unstretched.
    pub passed_through: usize,
    /// Degenerate segments left out of the output.
    pub skipped: usize,
    /// Beat indices removed while cleaning the grids.
    pub dropped_beats: Vec<usize>,
}

/// Output of [`warp`].
#[derive(Debug, Clone, PartialEq)]
pub struct WarpResult {
    /// Warped audio, same channel count and sample rate as the input.
    pub audio: AudioBuffer,
    pub sample_rate: u32,
    /// The backend that actually ran (never `Auto`).
    pub backend: BackendKind,
    pub stats: WarpStats,
}

/// One segment after stretching, one vector per channel.
struct RenderedSegment {
    channels: Vec<Vec<Sample>>,
    stretched: bool,
}

/// Warps `buffer` so that audio at each `source` beat lands on the matching
/// `target` beat.
///
/// Only the audio between the first and last usable beat is rendered.
/// Segments are stretched independently (in parallel when
/// `options.workers != 1`) and assembled strictly in time order.
///
/// # Errors
/// Fails before producing any audio on invalid options or buffer, NaN or
/// infinite samples, mismatched or too short grids, or an explicitly
/// requested backend that is not compiled in. A backend failure on any
/// segment aborts the run.
pub fn warp(
    buffer: &AudioBuffer,
    source: &BeatGrid,
    target: &BeatGrid,
    options: &WarpOptions,
) -> Result<WarpResult, WarpError> {
    options.validate()?;
    validate_buffer(buffer)?;
    let backend = options.backend.resolve()?;
    let sample_rate = buffer.sample_rate;
    let plan = planner::plan(source, target, buffer.num_frames(), sample_rate)?;

    let crossfade = options.crossfade_samples(sample_rate);
    let min_segment = options.min_segment_samples(sample_rate);
    let workers = pool::effective_workers(options.workers, plan.jobs.len());
    log::info!(
        "warping {} segments ({} ch, {} Hz) with {} backend on {} worker(s)",
        plan.jobs.len(),
        buffer.channels,
        sample_rate,
        backend,
        workers
    );

    let planar = buffer.to_planar();
    let mut assembler = OverlapAddAssembler::new(planar.len(), crossfade);
    let mut stats = WarpStats {
        skipped: plan.degenerate.len(),
        dropped_beats: plan.dropped_beats.clone(),
        ..WarpStats::default()
    };

    pool::run_ordered(
        &plan.jobs,
        workers,
        || backend.create(),
        |stretcher, job| render_segment(job, &planar, &mut **stretcher, sample_rate, min_segment),
        |_, segment| {
            if segment.stretched {
                stats.stretched += 1;
            } else {
                stats.passed_through += 1;
            }
            assembler.append(segment.channels);
            Ok(())
        },
    )?;

    let mut channels = assembler.finish();
    if let Some(headroom_db) = options.headroom_db {
        PeakNormalizer::new(headroom_db).normalize_planar(&mut channels);
    }
    let audio = AudioBuffer::from_channels(&channels, sample_rate)?;
    log::info!(
        "warp done: {} frames in, {} frames out ({} stretched, {} passed through, {} skipped, {} beats dropped)",
        buffer.num_frames(),
        audio.num_frames(),
        stats.stretched,
        stats.passed_through,
        stats.skipped,
        stats.dropped_beats.len()
    );

    Ok(WarpResult {
        audio,
        sample_rate,
        backend,
        stats,
    })
}

fn validate_buffer(buffer: &AudioBuffer) -> Result<(), WarpError> {
    if buffer.channels == 0 || buffer.sample_rate == 0 {
        return Err(WarpError::InvalidBuffer(format!(
            "{} channels at {} Hz",
            buffer.channels, buffer.sample_rate
        )));
    }
    if buffer.data.len() % buffer.channels as usize != 0 {
        return Err(WarpError::InvalidBuffer(format!(
            "{} samples is not a whole number of {}-channel frames",
            buffer.data.len(),
            buffer.channels
        )));
    }
    if buffer.data.iter().any(|s| !s.is_finite()) {
        return Err(WarpError::NonFiniteInput);
    }
    Ok(())
}

/// Stretches every channel of one job with the same rate, or copies it
/// unchanged if it is shorter than `min_segment` frames.
fn render_segment(
    job: &SegmentJob,
    planar: &[Vec<Sample>],
    backend: &mut dyn StretchBackend,
    sample_rate: u32,
    min_segment: usize,
) -> Result<RenderedSegment, WarpError> {
    let range = job.source_range.clone();
    if job.source_len() < min_segment {
        log::debug!(
            "segment at beat {} ({} frames, [{:.4}, {:.4})s) is under {} frames; passing through",
            job.beat_index,
            job.source_len(),
            job.source_start,
            job.source_end,
            min_segment
        );
        return Ok(RenderedSegment {
            channels: planar.iter().map(|ch| ch[range.clone()].to_vec()).collect(),
            stretched: false,
        });
    }

    let rate = job.rate();
    let clamped = clamp_rate(rate)?;
    if clamped != rate {
        log::debug!(
            "segment at beat {}: rate {:.3} clamped to {:.3}",
            job.beat_index,
            rate,
            clamped
        );
    }

    let mut channels = planar
        .iter()
        .map(|ch| backend.stretch(&ch[range.clone()], sample_rate, clamped))
        .collect::<Result<Vec<_>, _>>()?;
    let shortest = channels.iter().map(Vec::len).min().unwrap_or(0);
    for channel in channels.iter_mut() {
        channel.truncate(shortest);
    }
    Ok(RenderedSegment {
        channels,
        stretched: true,
    })
}
