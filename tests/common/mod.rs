#![allow(dead_code)]

use std::f32::consts::PI;

use beatwarp::AudioBuffer;

pub fn gen_sine(freq_hz: f32, sr: u32, n: usize, amp: f32) -> Vec<f32> {
    (0..n)
        .map(|i| amp * (2.0 * PI * freq_hz * i as f32 / sr as f32).sin())
        .collect()
}

/// Decaying 60 Hz kick bursts at the given sample positions.
pub fn gen_kick_train(sr: u32, n: usize, positions: &[usize]) -> Vec<f32> {
    let kick_len = (sr as f32 * 0.03) as usize;
    let mut out = vec![0.0f32; n];
    for &p in positions {
        for i in 0..kick_len.min(n.saturating_sub(p)) {
            let t = i as f32 / sr as f32;
            out[p + i] += 0.9 * (-t * 120.0).exp() * (2.0 * PI * 60.0 * t).sin();
        }
        // short broadband click on the attack
        for i in 0..8.min(n.saturating_sub(p)) {
            out[p + i] += if i < 4 { 0.6 } else { -0.4 };
        }
    }
    out
}

/// Sample positions of `count` beats at `bpm` starting at `offset`, each
/// shifted by the matching `jitter` entry (cycled).
pub fn beat_positions(sr: u32, bpm: f64, offset: usize, count: usize, jitter: &[i64]) -> Vec<usize> {
    let period = 60.0 * sr as f64 / bpm;
    (0..count)
        .map(|i| {
            let j = if jitter.is_empty() { 0 } else { jitter[i % jitter.len()] };
            ((offset as f64 + i as f64 * period).round() as i64 + j).max(0) as usize
        })
        .collect()
}

pub fn mono(data: Vec<f32>, sr: u32) -> AudioBuffer {
    AudioBuffer::from_mono(data, sr).unwrap()
}

pub fn stereo(left: &[f32], right: &[f32], sr: u32) -> AudioBuffer {
    AudioBuffer::from_channels(&[left.to_vec(), right.to_vec()], sr).unwrap()
}

pub fn rms(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = signal.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / signal.len() as f64).sqrt()
}

/// Dominant frequency estimated from the zero-crossing rate.
pub fn dominant_freq_zcr(signal: &[f32], sr: u32) -> f32 {
    if signal.len() < 4 {
        return 0.0;
    }
    let crossings = signal
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let duration = (signal.len() - 1) as f32 / sr as f32;
    crossings as f32 / (2.0 * duration)
}
