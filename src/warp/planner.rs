//! Beat grid validation and segment planning.

use std::ops::Range;

use crate::error::{BeatStage, WarpError};
use crate::grid::BeatGrid;

/// Fewest beats (before and after cleaning) a warp accepts.
pub const MIN_BEATS: usize = 4;

/// Beats closer than this to their predecessor are treated as duplicates.
pub const DUPLICATE_EPSILON: f64 = 1e-6;

/// Floor applied to interval durations when computing a stretch rate.
const MIN_DURATION: f64 = 1e-6;

/// One beat interval to stretch: a source interval of the input buffer and
/// the destination interval it must fill.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentJob {
    /// Index of the interval's first beat in the supplied grids.
    pub beat_index: usize,
    /// Source interval start, seconds.
    pub source_start: f64,
    /// Source interval end, seconds.
    pub source_end: f64,
    /// Destination interval start, seconds.
    pub target_start: f64,
    /// Destination interval end, seconds.
    pub target_end: f64,
    /// Frame range of the source interval in the input buffer.
    pub source_range: Range<usize>,
}

impl SegmentJob {
    pub fn source_duration(&self) -> f64 {
        (self.source_end - self.source_start).max(MIN_DURATION)
    }

    pub fn target_duration(&self) -> f64 {
        (self.target_end - self.target_start).max(MIN_DURATION)
    }

    /// Stretch rate: source duration over destination duration.
    pub fn rate(&self) -> f64 {
        self.source_duration() / self.target_duration()
    }

    /// Frames in the source interval.
    pub fn source_len(&self) -> usize {
        self.source_range.len()
    }

    /// Destination length in frames at `sample_rate`.
    pub fn target_len(&self, sample_rate: u32) -> usize {
        let sr = sample_rate as f64;
        let start = (self.target_start * sr).round() as i64;
        let end = (self.target_end * sr).round() as i64;
        (end - start).max(0) as usize
    }
}

/// An interval that was skipped because it has no usable samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DegenerateSegment {
    /// Index of the interval's first beat in the supplied grids.
    pub beat_index: usize,
    pub source_start: f64,
    pub source_end: f64,
    pub target_start: f64,
    pub target_end: f64,
    /// Source frames after rounding and clamping to the buffer. Empty or
    /// reversed when the source side is the degenerate one.
    pub source_frames: (usize, usize),
}

/// Grids after duplicate and non-increasing beats were dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanedGrids {
    pub source: Vec<f64>,
    pub target: Vec<f64>,
    /// Original indices of the kept beats.
    pub kept: Vec<usize>,
    /// Original indices of the dropped beats.
    pub dropped: Vec<usize>,
}

/// The jobs for one warp plus the diagnostics gathered while planning.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SegmentPlan {
    /// Jobs in increasing time order.
    pub jobs: Vec<SegmentJob>,
    /// Beat indices removed by cleaning.
    pub dropped_beats: Vec<usize>,
    /// Intervals skipped for having no samples.
    pub degenerate: Vec<DegenerateSegment>,
}

/// Drops beat pairs whose source or target time does not advance by more
/// than [`DUPLICATE_EPSILON`] past the last kept beat. The first beat is
/// always kept, so the result is strictly increasing on both sides and
/// cleaning it again changes nothing.
pub fn clean_grids(source: &[f64], target: &[f64]) -> CleanedGrids {
    let mut cleaned = CleanedGrids::default();
    for (i, (&s, &t)) in source.iter().zip(target).enumerate() {
        let keep = match (cleaned.source.last(), cleaned.target.last()) {
            (Some(&prev_s), Some(&prev_t)) => {
                s > prev_s + DUPLICATE_EPSILON && t > prev_t + DUPLICATE_EPSILON
            }
            _ => true,
        };
        if keep {
            cleaned.source.push(s);
            cleaned.target.push(t);
            cleaned.kept.push(i);
        } else {
            log::debug!(
                "dropping beat {} (source {:.6}s, target {:.6}s): not after previous beat",
                i,
                s,
                t
            );
            cleaned.dropped.push(i);
        }
    }
    cleaned
}

/// Validates a pair of beat grids and cuts them into segment jobs over a
/// buffer of `total_frames` frames.
///
/// # Errors
/// - [`WarpError::LengthMismatch`] if the grids differ in length.
/// - [`WarpError::InsufficientBeats`] with fewer than [`MIN_BEATS`] beats as
///   supplied or after cleaning.
/// - [`WarpError::InvalidSettings`] if a beat time is NaN or infinite.
pub fn plan(
    source: &BeatGrid,
    target: &BeatGrid,
    total_frames: usize,
    sample_rate: u32,
) -> Result<SegmentPlan, WarpError> {
    if source.len() != target.len() {
        return Err(WarpError::LengthMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }
    if source.len() < MIN_BEATS {
        return Err(WarpError::InsufficientBeats {
            found: source.len(),
            required: MIN_BEATS,
            stage: BeatStage::Supplied,
        });
    }
    if sample_rate == 0 {
        return Err(WarpError::InvalidBuffer(
            "sample rate must be greater than 0".to_string(),
        ));
    }
    for (name, grid) in [("source", source), ("target", target)] {
        if let Some(i) = grid.times().iter().position(|t| !t.is_finite()) {
            return Err(WarpError::InvalidSettings(format!(
                "{} beat {} is not a finite time",
                name, i
            )));
        }
    }

    let cleaned = clean_grids(source.times(), target.times());
    if cleaned.source.len() < MIN_BEATS {
        return Err(WarpError::InsufficientBeats {
            found: cleaned.source.len(),
            required: MIN_BEATS,
            stage: BeatStage::AfterCleaning,
        });
    }

    let sr = sample_rate as f64;
    let to_frame = |t: f64| ((t * sr).round().max(0.0) as usize).min(total_frames);

    let mut plan = SegmentPlan {
        dropped_beats: cleaned.dropped.clone(),
        ..SegmentPlan::default()
    };
    for k in 0..cleaned.source.len() - 1 {
        let beat_index = cleaned.kept[k];
        let (source_start, source_end) = (cleaned.source[k], cleaned.source[k + 1]);
        let (target_start, target_end) = (cleaned.target[k], cleaned.target[k + 1]);
        let (s0, s1) = (to_frame(source_start), to_frame(source_end));

        let job = SegmentJob {
            beat_index,
            source_start,
            source_end,
            target_start,
            target_end,
            source_range: s0..s1.max(s0),
        };
        if s1 <= s0 || job.target_len(sample_rate) == 0 {
            log::debug!(
                "skipping degenerate segment at beat {}: source [{:.6}, {:.6})s -> frames [{}, {}), \
                 target [{:.6}, {:.6})s",
                beat_index,
                source_start,
                source_end,
                s0,
                s1,
                target_start,
                target_end
            );
            plan.degenerate.push(DegenerateSegment {
                beat_index,
                source_start,
                source_end,
                target_start,
                target_end,
                source_frames: (s0, s1),
            });
            continue;
        }
        plan.jobs.push(job);
    }
    Ok(plan)
}
