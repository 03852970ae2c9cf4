//! FFT constants and overlap-add normalization shared by the phase vocoder
//! and the onset detector.

use rustfft::num_complex::Complex;

/// Zero-valued complex number, used for FFT buffer initialization.
pub const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

/// Minimum window sum (as a fraction of max) to prevent amplification
/// in low-overlap regions during overlap-add normalization.
pub const WINDOW_SUM_FLOOR_RATIO: f32 = 0.1;

/// Absolute floor for window sum normalization to prevent division by zero.
pub const WINDOW_SUM_EPSILON: f32 = 1e-6;

/// Divides an overlap-added signal by its accumulated squared-window sum.
///
/// The divisor is floored at `WINDOW_SUM_FLOOR_RATIO` of the maximum so the
/// sparsely covered edges are not blown up.
pub fn normalize_by_window_sum(output: &mut [f32], window_sum: &[f32]) {
    let max_sum = window_sum.iter().copied().fold(0.0f32, f32::max);
    let floor = (max_sum * WINDOW_SUM_FLOOR_RATIO).max(WINDOW_SUM_EPSILON);
    for (sample, &ws) in output.iter_mut().zip(window_sum.iter()) {
        *sample /= ws.max(floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_divides_by_sum() {
        let mut out = vec![1.0, 2.0, 3.0];
        normalize_by_window_sum(&mut out, &[1.0, 2.0, 1.5]);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
        assert!((out[2] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_floors_small_sums() {
        let mut out = vec![0.01, 1.0];
        normalize_by_window_sum(&mut out, &[0.0, 1.0]);
        // floor = 0.1 * 1.0
        assert!((out[0] - 0.1).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_all_zero_sums() {
        let mut out = vec![0.0, 0.0];
        normalize_by_window_sum(&mut out, &[0.0, 0.0]);
        assert!(out.iter().all(|s| s.is_finite()));
    }
}
