//! Window functions for STFT analysis/resynthesis and edge fades.

use std::f64::consts::PI;

/// Returns `Some(trivial_window)` for degenerate sizes (0 or 1), or `None`
/// to indicate the caller should compute the full window.
#[inline]
fn trivial_window(size: usize) -> Option<Vec<f32>> {
    match size {
        0 => Some(vec![]),
        1 => Some(vec![1.0]),
        _ => None,
    }
}

/// Generates a periodic Hann window (DFT-even), which sums to a constant
/// under 75% overlap.
pub fn hann_window(size: usize) -> Vec<f32> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let n = size as f64;
    (0..size)
        .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / n).cos())) as f32)
        .collect()
}

/// Linear ramp of `len` points from `from` to `to`, both endpoints included.
pub fn linear_ramp(len: usize, from: f32, to: f32) -> Vec<f32> {
    match len {
        0 => vec![],
        1 => vec![from],
        _ => {
            let step = (to - from) / (len - 1) as f32;
            (0..len).map(|i| from + step * i as f32).collect()
        }
    }
}

/// Applies a window function to a slice in-place.
#[inline]
pub fn apply_window(data: &mut [f32], window: &[f32]) {
    for (sample, &w) in data.iter_mut().zip(window.iter()) {
        *sample *= w;
    }
}
