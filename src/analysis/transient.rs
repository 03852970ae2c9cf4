//! Kick-weighted spectral-flux onset detection with adaptive thresholding.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::core::fft::COMPLEX_ZERO;
use crate::core::window::hann_window;

/// Onset strength per analysis frame. Frame `i` is centered on sample
/// `i * hop_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    /// Weighted positive spectral flux per frame.
    pub flux: Vec<f32>,
    pub fft_size: usize,
    pub hop_size: usize,
}

impl OnsetEnvelope {
    /// Sample position of a flux peak at `frame`. The flux of a sharp attack
    /// peaks `fft_size / 4 - hop_size / 2` samples before the attack.
    pub fn frame_to_sample(&self, frame: usize) -> usize {
        frame * self.hop_size + (self.fft_size / 4).saturating_sub(self.hop_size / 2)
    }
}

// Frequency band boundaries for onset weighting (Hz).
const BAND_KICK_LIMIT: f32 = 150.0;
const BAND_LOW_MID_LIMIT: f32 = 500.0;
const BAND_MID_LIMIT: f32 = 2000.0;
const BAND_HIGH_MID_LIMIT: f32 = 8000.0;

/// Kick fundamentals (<150 Hz): strongest weight, beats live here.
const WEIGHT_KICK: f32 = 1.5;
/// Kick body and bass (150-500 Hz).
const WEIGHT_LOW_MID: f32 = 0.8;
/// Mids (500 Hz-2 kHz): vocals and pads, mostly noise for beat tracking.
const WEIGHT_MID: f32 = 0.4;
/// Snare and clap attacks (2-8 kHz).
const WEIGHT_HIGH_MID: f32 = 0.7;
/// Very high (>8 kHz): hats.
const WEIGHT_VERY_HIGH: f32 = 0.3;

/// Per-bin flux weights favouring kick drum energy.
fn compute_bin_weights(fft_size: usize, sample_rate: u32) -> Vec<f32> {
    let num_bins = fft_size / 2 + 1;
    let bin_freq = sample_rate as f32 / fft_size as f32;

    (0..num_bins)
        .map(|bin| {
            let freq = bin as f32 * bin_freq;
            if freq < BAND_KICK_LIMIT {
                WEIGHT_KICK
            } else if freq < BAND_LOW_MID_LIMIT {
                WEIGHT_LOW_MID
            } else if freq < BAND_MID_LIMIT {
                WEIGHT_MID
            } else if freq < BAND_HIGH_MID_LIMIT {
                WEIGHT_HIGH_MID
            } else {
                WEIGHT_VERY_HIGH
            }
        })
        .collect()
}

/// Computes the onset envelope of a mono signal using centered frames.
pub fn onset_envelope(
    samples: &[f32],
    sample_rate: u32,
    fft_size: usize,
    hop_size: usize,
) -> OnsetEnvelope {
    if samples.is_empty() || fft_size == 0 || hop_size == 0 {
        return OnsetEnvelope {
            flux: Vec::new(),
            fft_size,
            hop_size,
        };
    }

    let pad = fft_size / 2;
    let num_frames = samples.len() / hop_size + 1;
    let mut padded = vec![0.0f32; (num_frames - 1) * hop_size + fft_size];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    let window = hann_window(fft_size);
    let weights = compute_bin_weights(fft_size, sample_rate);
    let num_bins = fft_size / 2 + 1;

    let mut prev_magnitude = vec![0.0f32; num_bins];
    let mut flux = Vec::with_capacity(num_frames);
    let mut buffer = vec![COMPLEX_ZERO; fft_size];

    for frame in 0..num_frames {
        let start = frame * hop_size;
        for (slot, (&s, &w)) in buffer
            .iter_mut()
            .zip(padded[start..start + fft_size].iter().zip(&window))
        {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buffer);

        let mut value = 0.0f32;
        for ((c, prev), &weight) in buffer[..num_bins]
            .iter()
            .zip(prev_magnitude.iter_mut())
            .zip(&weights)
        {
            let mag = c.norm();
            let diff = mag - *prev;
            if diff > 0.0 {
                value += diff * weight;
            }
            *prev = mag;
        }
        flux.push(value);
    }

    OnsetEnvelope {
        flux,
        fft_size,
        hop_size,
    }
}

/// Number of frames in the local median window for adaptive thresholding.
const MEDIAN_WINDOW_FRAMES: usize = 11;
/// Minimum time between two onsets.
const MIN_ONSET_GAP_SECS: f64 = 0.1;
/// Absolute threshold floor, keeps near-silence quiet.
const THRESHOLD_FLOOR: f32 = 0.01;
/// Threshold floor relative to the strongest frame.
const RELATIVE_FLOOR: f32 = 0.05;

/// Picks onset sample positions from an envelope: local flux maxima above a
/// sliding-median threshold, at least [`MIN_ONSET_GAP_SECS`] apart.
///
/// Higher `sensitivity` (0..1) lowers the threshold.
pub fn pick_onsets(envelope: &OnsetEnvelope, sample_rate: u32, sensitivity: f32) -> Vec<usize> {
    let flux = &envelope.flux;
    if flux.is_empty() || envelope.hop_size == 0 {
        return Vec::new();
    }

    let half_window = MEDIAN_WINDOW_FRAMES / 2;
    let threshold_multiplier = 1.0 + (1.0 - sensitivity.clamp(0.0, 1.0)) * 4.0;
    let max_flux = flux.iter().copied().fold(0.0f32, f32::max);
    let floor = THRESHOLD_FLOOR.max(max_flux * RELATIVE_FLOOR);
    let min_gap =
        ((MIN_ONSET_GAP_SECS * sample_rate as f64) / envelope.hop_size as f64).ceil() as usize;

    let mut onsets = Vec::new();
    let mut last_onset: Option<usize> = None;
    let mut local = Vec::with_capacity(MEDIAN_WINDOW_FRAMES);

    for (i, &value) in flux.iter().enumerate() {
        let prev = if i > 0 { flux[i - 1] } else { 0.0 };
        let next = flux.get(i + 1).copied().unwrap_or(0.0);
        if value < prev || value <= next {
            continue;
        }

        let start = i.saturating_sub(half_window);
        let end = (i + half_window + 1).min(flux.len());
        local.clear();
        local.extend_from_slice(&flux[start..end]);
        local.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = local[local.len() / 2];

        if value <= median * threshold_multiplier + floor {
            continue;
        }
        if matches!(last_onset, Some(last) if i - last < min_gap) {
            continue;
        }
        onsets.push(envelope.frame_to_sample(i));
        last_onset = Some(i);
    }

    onsets
}

/// Detects onset sample positions in a mono signal.
pub fn detect_onsets(
    samples: &[f32],
    sample_rate: u32,
    fft_size: usize,
    hop_size: usize,
    sensitivity: f32,
) -> Vec<usize> {
    let envelope = onset_envelope(samples, sample_rate, fft_size, hop_size);
    pick_onsets(&envelope, sample_rate, sensitivity)
}
