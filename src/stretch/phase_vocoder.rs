//! Phase vocoder stretcher: the dependency-free fallback backend.
//!
//! Analysis frames are taken at a fixed hop; synthesis walks the analysis
//! frames in steps of `rate`, interpolating magnitudes between neighbouring
//! frames and accumulating each bin's phase from its measured instantaneous
//! frequency. Resynthesis uses the same fixed hop, so the output is
//! `1 / rate` times as long as the input at the original pitch.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

use super::{clamp_rate, stretched_len, StretchBackend};
use crate::core::fft::{normalize_by_window_sum, COMPLEX_ZERO};
use crate::core::window::hann_window;
use crate::error::WarpError;

const TWO_PI: f32 = 2.0 * PI;

/// Largest analysis frame; shorter segments use smaller frames.
pub const DEFAULT_FFT_SIZE: usize = 2048;
/// Segments shorter than this are resampled instead of vocoded.
pub const MIN_FFT_SIZE: usize = 128;
/// Frames per hop (75% overlap).
const OVERLAP: usize = 4;
/// Rates this close to 1.0 return the input untouched.
const IDENTITY_TOLERANCE: f64 = 1e-9;

/// Phase vocoder state. The FFT planner is cached across segments.
pub struct PhaseVocoder {
    max_fft_size: usize,
    planner: FftPlanner<f32>,
}

impl Default for PhaseVocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseVocoder {
    /// Creates a phase vocoder with the default frame size.
    pub fn new() -> Self {
        Self::with_fft_size(DEFAULT_FFT_SIZE)
    }

    /// Creates a phase vocoder whose largest frame is `fft_size`, rounded up
    /// to a power of two no smaller than [`MIN_FFT_SIZE`].
    pub fn with_fft_size(fft_size: usize) -> Self {
        Self {
            max_fft_size: fft_size.next_power_of_two().max(MIN_FFT_SIZE),
            planner: FftPlanner::new(),
        }
    }

    /// Frame size used for a segment of `len` samples, or `None` if the
    /// segment is shorter than the smallest frame.
    pub fn fft_size_for(&self, len: usize) -> Option<usize> {
        let mut fft_size = self.max_fft_size;
        while fft_size > len && fft_size > MIN_FFT_SIZE {
            fft_size /= 2;
        }
        (fft_size <= len).then_some(fft_size)
    }

    /// Stretches a mono signal by `rate` (already clamped). The result is
    /// exactly `round(input.len() / rate)` samples long.
    pub fn process(&mut self, input: &[f32], rate: f64) -> Vec<f32> {
        let out_len = stretched_len(input.len(), rate);
        if input.is_empty() {
            return Vec::new();
        }
        if (rate - 1.0).abs() < IDENTITY_TOLERANCE {
            return input.to_vec();
        }
        let Some(fft_size) = self.fft_size_for(input.len()) else {
            return resample_linear(input, out_len);
        };
        let hop = fft_size / OVERLAP;
        let window = hann_window(fft_size);

        let spectra = self.analyze(input, &window, hop);
        let frames = advance_frames(&spectra, fft_size, hop, rate);
        let mut output = self.resynthesize(frames, &window, hop);

        // Centered frames: drop the half-frame of leading padding.
        let start = (fft_size / 2).min(output.len());
        output.drain(..start);
        output.resize(out_len, 0.0);
        output
    }

    /// Short-time spectra (bins `0..=fft_size/2`) of `input`, with frames
    /// centered on multiples of `hop`.
    fn analyze(&mut self, input: &[f32], window: &[f32], hop: usize) -> Vec<Vec<Complex<f32>>> {
        let fft_size = window.len();
        let num_bins = fft_size / 2 + 1;
        let pad = fft_size / 2;
        let num_frames = input.len() / hop + 1;

        let mut padded = vec![0.0f32; (num_frames - 1) * hop + fft_size];
        padded[pad..pad + input.len()].copy_from_slice(input);

        let fft = self.planner.plan_fft_forward(fft_size);
        let mut buffer = vec![COMPLEX_ZERO; fft_size];
        (0..num_frames)
            .map(|frame| {
                let frame_start = frame * hop;
                for (slot, (&s, &w)) in buffer
                    .iter_mut()
                    .zip(padded[frame_start..frame_start + fft_size].iter().zip(window))
                {
                    *slot = Complex::new(s * w, 0.0);
                }
                fft.process(&mut buffer);
                buffer[..num_bins].to_vec()
            })
            .collect()
    }

    /// Inverse-transforms half spectra and overlap-adds them at `hop`.
    fn resynthesize(
        &mut self,
        frames: Vec<Vec<Complex<f32>>>,
        window: &[f32],
        hop: usize,
    ) -> Vec<f32> {
        let fft_size = window.len();
        let half = fft_size / 2;
        if frames.is_empty() {
            return Vec::new();
        }
        let out_len = (frames.len() - 1) * hop + fft_size;
        let mut output = vec![0.0f32; out_len];
        let mut window_sum = vec![0.0f32; out_len];

        let ifft = self.planner.plan_fft_inverse(fft_size);
        let mut buffer = vec![COMPLEX_ZERO; fft_size];
        let norm = 1.0 / fft_size as f32;

        for (frame_idx, half_spectrum) in frames.into_iter().enumerate() {
            buffer[..=half].copy_from_slice(&half_spectrum);
            buffer[0].im = 0.0;
            buffer[half].im = 0.0;
            for bin in 1..half {
                buffer[fft_size - bin] = buffer[bin].conj();
            }
            ifft.process(&mut buffer);

            let offset = frame_idx * hop;
            for (i, &w) in window.iter().enumerate() {
                output[offset + i] += buffer[i].re * norm * w;
                window_sum[offset + i] += w * w;
            }
        }

        normalize_by_window_sum(&mut output, &window_sum);
        output
    }
}

impl StretchBackend for PhaseVocoder {
    fn name(&self) -> &'static str {
        "phase-vocoder"
    }

    fn stretch(
        &mut self,
        segment: &[f32],
        _sample_rate: u32,
        rate: f64,
    ) -> Result<Vec<f32>, WarpError> {
        let rate = clamp_rate(rate)?;
        Ok(self.process(segment, rate))
    }
}

/// Walks the analysis frames in steps of `rate`, producing synthesis frames
/// with interpolated magnitudes and accumulated phases.
fn advance_frames(
    spectra: &[Vec<Complex<f32>>],
    fft_size: usize,
    hop: usize,
    rate: f64,
) -> Vec<Vec<Complex<f32>>> {
    let Some(first) = spectra.first() else {
        return Vec::new();
    };
    let num_bins = first.len();
    let expected_advance: Vec<f32> = (0..num_bins)
        .map(|bin| TWO_PI * bin as f32 * hop as f32 / fft_size as f32)
        .collect();
    let mut phase_accum: Vec<f32> = first.iter().map(|c| c.arg()).collect();

    let num_steps = (spectra.len() as f64 / rate).ceil() as usize;
    let mut frames = Vec::with_capacity(num_steps);
    for step in 0..num_steps {
        let position = step as f64 * rate;
        let left = position.floor() as usize;
        if left >= spectra.len() {
            break;
        }
        let alpha = (position - left as f64) as f32;
        let current = &spectra[left];
        let next = spectra.get(left + 1);

        let mut frame = vec![COMPLEX_ZERO; num_bins];
        for bin in 0..num_bins {
            let (next_mag, next_phase) = next.map_or((0.0, 0.0), |s| (s[bin].norm(), s[bin].arg()));
            let magnitude = (1.0 - alpha) * current[bin].norm() + alpha * next_mag;
            frame[bin] = Complex::from_polar(magnitude, phase_accum[bin]);

            let deviation =
                wrap_phase(next_phase - current[bin].arg() - expected_advance[bin]);
            phase_accum[bin] += expected_advance[bin] + deviation;
        }
        frames.push(frame);
    }
    frames
}

/// Wraps a phase value to [-PI, PI].
#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let p = phase + PI;
    p - (p / TWO_PI).floor() * TWO_PI - PI
}

/// Linear-interpolation resample to `out_len` samples, for segments too
/// short to analyze.
fn resample_linear(input: &[f32], out_len: usize) -> Vec<f32> {
    match (input.len(), out_len) {
        (_, 0) | (0, _) => Vec::new(),
        (1, n) => vec![input[0]; n],
        (_, 1) => vec![input[0]],
        (len, n) => {
            let step = (len - 1) as f64 / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let pos = i as f64 * step;
                    let idx = (pos.floor() as usize).min(len - 2);
                    let frac = (pos - idx as f64) as f32;
                    input[idx] + (input[idx + 1] - input[idx]) * frac
                })
                .collect()
        }
    }
}
