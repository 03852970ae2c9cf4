//! Output peak safety net.

use crate::core::{AudioBuffer, Sample};

/// Scales audio down so its peak sits `headroom_db` below full scale.
/// Never amplifies, and no output sample ever exceeds the target peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakNormalizer {
    headroom_db: f64,
}

impl PeakNormalizer {
    pub fn new(headroom_db: f64) -> Self {
        Self { headroom_db }
    }

    pub fn headroom_db(&self) -> f64 {
        self.headroom_db
    }

    /// Largest peak the output may have: `10^(-headroom_db / 20)`.
    pub fn target_peak(&self) -> f64 {
        10f64.powf(-self.headroom_db / 20.0)
    }

    /// Scales `samples` in place if their peak exceeds the target. Returns
    /// the gain applied (1.0 when left unchanged).
    pub fn normalize_samples(&self, samples: &mut [Sample]) -> f64 {
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs())) as f64;
        self.apply(peak, samples.iter_mut())
    }

    /// Scales every channel by one shared gain.
    pub fn normalize_planar(&self, channels: &mut [Vec<Sample>]) -> f64 {
        let peak = channels
            .iter()
            .flatten()
            .fold(0.0f32, |acc, s| acc.max(s.abs())) as f64;
        self.apply(peak, channels.iter_mut().flatten())
    }

    /// Normalizes a buffer, returning it with the gain applied.
    pub fn normalize(&self, mut buffer: AudioBuffer) -> AudioBuffer {
        self.normalize_samples(&mut buffer.data);
        buffer
    }

    /// Target peak as the largest sample value not above it.
    fn ceiling(&self) -> Sample {
        let target = self.target_peak();
        let ceiling = target as Sample;
        if ceiling as f64 > target && ceiling > 0.0 {
            Sample::from_bits(ceiling.to_bits() - 1)
        } else {
            ceiling
        }
    }

    fn apply<'a>(&self, peak: f64, samples: impl Iterator<Item = &'a mut Sample>) -> f64 {
        let ceiling = self.ceiling();
        let target = ceiling as f64;
        if peak == 0.0 || peak <= target {
            return 1.0;
        }
        let gain = target / peak;
        log::debug!(
            "peak {:.4} above {:.4} ({} dB headroom), scaling by {:.4}",
            peak,
            target,
            self.headroom_db,
            gain
        );
        let g = gain as Sample;
        // the scaled peak can round a hair above the ceiling
        for s in samples {
            *s = (*s * g).clamp(-ceiling, ceiling);
        }
        gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_peak() {
        assert!((PeakNormalizer::new(0.0).target_peak() - 1.0).abs() < 1e-12);
        assert!((PeakNormalizer::new(6.0).target_peak() - 0.501187).abs() < 1e-5);
    }

    #[test]
    fn test_loud_signal_scaled_to_target() {
        let norm = PeakNormalizer::new(1.0);
        let mut samples = vec![0.2, -1.4, 0.9];
        let gain = norm.normalize_samples(&mut samples);
        assert!(gain < 1.0);
        let peak = samples.iter().fold(0.0f32, |a, s| a.max(s.abs())) as f64;
        assert!((peak - norm.target_peak()).abs() < 1e-6);
        // relative levels are kept
        assert!((samples[0] / samples[2] - 0.2 / 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let norm = PeakNormalizer::new(1.0);
        let mut samples = vec![0.1, -0.5, 0.3];
        assert_eq!(norm.normalize_samples(&mut samples), 1.0);
        assert_eq!(samples, vec![0.1, -0.5, 0.3]);
    }

    #[test]
    fn test_silence_untouched() {
        let norm = PeakNormalizer::new(3.0);
        let mut samples = vec![0.0; 16];
        assert_eq!(norm.normalize_samples(&mut samples), 1.0);
    }

    #[test]
    fn test_idempotent() {
        let norm = PeakNormalizer::new(1.0);
        let mut samples = vec![1.8, -0.3, 0.7, -2.2];
        norm.normalize_samples(&mut samples);
        let once = samples.clone();
        norm.normalize_samples(&mut samples);
        assert_eq!(samples, once);
    }

    #[test]
    fn test_peak_just_above_target_is_pulled_under() {
        for headroom in [0.1, 1.0, 3.0, 6.0] {
            let norm = PeakNormalizer::new(headroom);
            let target = norm.target_peak();
            let over = (target * (1.0 + 5e-7)) as f32;
            let mut samples = vec![0.1, over, -over, 0.3];
            norm.normalize_samples(&mut samples);
            for &s in &samples {
                assert!(s.abs() as f64 <= target, "{} dB: {} above {}", headroom, s, target);
            }
            let once = samples.clone();
            assert_eq!(norm.normalize_samples(&mut samples), 1.0);
            assert_eq!(samples, once);
        }
    }

    #[test]
    fn test_planar_uses_shared_gain() {
        let norm = PeakNormalizer::new(0.0);
        let mut channels = vec![vec![0.5, 2.0], vec![0.5, -0.25]];
        let gain = norm.normalize_planar(&mut channels);
        assert!((gain - 0.5).abs() < 1e-9);
        assert_eq!(channels, vec![vec![0.25, 1.0], vec![0.25, -0.125]]);
    }

    #[test]
    fn test_normalize_buffer() {
        let buffer = AudioBuffer::new(vec![1.5, -1.5, 0.5, 0.0], 2, 48000).unwrap();
        let out = PeakNormalizer::new(0.0).normalize(buffer);
        assert!((out.peak() - 1.0).abs() < 1e-6);
        assert_eq!(out.channels, 2);
    }
}
