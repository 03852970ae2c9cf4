//! Beat detection: tempo estimate plus a beat tracker that follows the
//! detected onsets, so timing drift in the recording stays visible to grid
//! correction.

use serde::{Deserialize, Serialize};

use crate::analysis::transient::detect_onsets;
use crate::core::{AudioBuffer, Sample};
use crate::error::WarpError;
use crate::grid::BeatGrid;

/// FFT size for beat detection.
const BEAT_FFT_SIZE: usize = 1024;
/// Hop size for beat detection analysis frames.
const BEAT_HOP_SIZE: usize = 256;
/// Onset sensitivity for kick detection (lower = fewer false positives).
const BEAT_SENSITIVITY: f32 = 0.5;
/// Lowest tempo the estimate is folded into.
const MIN_BPM: f64 = 70.0;
/// Highest tempo the estimate is folded into.
const MAX_BPM: f64 = 180.0;
/// How far from the predicted beat (fraction of a beat period) an onset may
/// be and still count as that beat.
const BEAT_TOLERANCE: f64 = 0.2;

/// Fewest beats a usable analysis must find.
pub const MIN_DETECTED_BEATS: usize = 8;

/// Detected beats of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatAnalysis {
    /// Beat times in seconds.
    pub beats: BeatGrid,
    /// Tempo estimate from the median inter-onset interval.
    pub bpm_estimate: f64,
    pub sample_rate: u32,
}

/// Detects beats in a mono signal.
///
/// # Errors
/// Returns [`WarpError::DetectionFailed`] if fewer than
/// [`MIN_DETECTED_BEATS`] beats are found.
pub fn analyze_beats(samples: &[Sample], sample_rate: u32) -> Result<BeatAnalysis, WarpError> {
    if sample_rate == 0 {
        return Err(WarpError::InvalidBuffer(
            "sample rate must be greater than 0".to_string(),
        ));
    }
    let onsets = detect_onsets(
        samples,
        sample_rate,
        BEAT_FFT_SIZE,
        BEAT_HOP_SIZE,
        BEAT_SENSITIVITY,
    );
    log::debug!("found {} onsets", onsets.len());
    if onsets.len() < 2 {
        return Err(WarpError::DetectionFailed(format!(
            "found {} onsets, not enough to estimate a tempo",
            onsets.len()
        )));
    }

    let intervals: Vec<usize> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
    let bpm = estimate_bpm_from_intervals(&intervals, sample_rate);
    let period = 60.0 * sample_rate as f64 / bpm;
    let beats = track_beats(&onsets, period, samples.len());

    if beats.len() < MIN_DETECTED_BEATS {
        return Err(WarpError::DetectionFailed(format!(
            "found {} beats, at least {} required; try a longer or more rhythmic excerpt",
            beats.len(),
            MIN_DETECTED_BEATS
        )));
    }
    log::info!("detected {} beats, tempo estimate {:.2} BPM", beats.len(), bpm);

    Ok(BeatAnalysis {
        beats: BeatGrid::from_samples(&beats, sample_rate),
        bpm_estimate: bpm,
        sample_rate,
    })
}

/// Detects beats in a buffer, mixing all channels down to mono first.
pub fn analyze_buffer(buffer: &AudioBuffer) -> Result<BeatAnalysis, WarpError> {
    analyze_beats(&mix_to_mono(buffer), buffer.sample_rate)
}

/// Averages all channels of an interleaved buffer.
fn mix_to_mono(buffer: &AudioBuffer) -> Vec<Sample> {
    let channels = buffer.channels.max(1) as usize;
    if channels == 1 {
        return buffer.data.clone();
    }
    let scale = 1.0 / channels as Sample;
    buffer
        .data
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<Sample>() * scale)
        .collect()
}

/// Estimates BPM from inter-onset intervals, folded by octaves into
/// [`MIN_BPM`]..=[`MAX_BPM`].
fn estimate_bpm_from_intervals(intervals: &[usize], sample_rate: u32) -> f64 {
    let mut sorted: Vec<usize> = intervals.iter().copied().filter(|&i| i > 0).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_unstable();
    let median_interval = sorted[sorted.len() / 2];

    let mut bpm = 60.0 * sample_rate as f64 / median_interval as f64;
    while bpm > MAX_BPM {
        bpm /= 2.0;
    }
    while bpm < MIN_BPM && bpm > 0.0 {
        bpm *= 2.0;
    }
    bpm
}

/// Walks forward from the first onset one beat period at a time. Each beat
/// snaps to the nearest onset within [`BEAT_TOLERANCE`] of the prediction;
/// without one, the predicted position is used. Tracking stops half a
/// period past the last onset or at the end of the signal.
fn track_beats(onsets: &[usize], period: f64, total_len: usize) -> Vec<usize> {
    let Some(&first) = onsets.first() else {
        return Vec::new();
    };
    if !(period.is_finite() && period >= 1.0) {
        return vec![first];
    }
    let last_onset = onsets[onsets.len() - 1] as f64;
    let tolerance = period * BEAT_TOLERANCE;

    let mut beats = vec![first];
    let mut position = first as f64;
    loop {
        let predicted = position + period;
        if predicted > last_onset + period * 0.5 || predicted >= total_len as f64 {
            break;
        }
        position = nearest_onset(onsets, predicted, tolerance)
            .map(|onset| onset as f64)
            .filter(|&onset| onset > position)
            .unwrap_or(predicted);
        beats.push(position.round() as usize);
    }
    beats
}

/// Onset closest to `target` within `tolerance` samples.
fn nearest_onset(onsets: &[usize], target: f64, tolerance: f64) -> Option<usize> {
    let lower = (target - tolerance).max(0.0);
    let start = onsets.partition_point(|&o| (o as f64) < lower);
    onsets[start..]
        .iter()
        .copied()
        .take_while(|&o| o as f64 <= target + tolerance)
        .min_by(|&a, &b| {
            let da = (a as f64 - target).abs();
            let db = (b as f64 - target).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
}
