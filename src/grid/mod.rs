//! Beat grids and tempo correction.
//!
//! A [`BeatGrid`] is a list of beat timestamps in seconds. [`correct_grid`]
//! pulls each detected beat toward an evenly spaced grid at the target tempo,
//! producing the destination grid the warp engine stretches audio onto.

mod corrector;

pub use corrector::{correct_grid, GridCorrectionSettings};

use serde::{Deserialize, Serialize};

/// Ordered beat timestamps in seconds, relative to the start of a buffer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeatGrid {
    times: Vec<f64>,
}

impl BeatGrid {
    /// Wraps beat times given in seconds.
    pub fn from_secs(times: Vec<f64>) -> Self {
        Self { times }
    }

    /// Builds a grid from sample positions at the given sample rate.
    pub fn from_samples(positions: &[usize], sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        Self {
            times: positions.iter().map(|&p| p as f64 / sr).collect(),
        }
    }

    /// Beat times in seconds.
    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Index of the beat closest to `time_secs`, or `None` for an empty grid
    /// or a non-finite time. Ties go to the earlier beat.
    pub fn nearest_index(&self, time_secs: f64) -> Option<usize> {
        if self.times.is_empty() || !time_secs.is_finite() {
            return None;
        }
        let i = self.times.partition_point(|&t| t < time_secs);
        if i == 0 {
            return Some(0);
        }
        if i == self.times.len() {
            return Some(i - 1);
        }
        if time_secs - self.times[i - 1] <= self.times[i] - time_secs {
            Some(i - 1)
        } else {
            Some(i)
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// True if every beat is later than the one before it.
    pub fn is_strictly_increasing(&self) -> bool {
        self.times.windows(2).all(|w| w[1] > w[0])
    }

    /// Mean tempo implied by the first and last beat, or `None` with fewer
    /// than two beats.
    pub fn mean_bpm(&self) -> Option<f64> {
        let (first, last) = (self.times.first()?, self.times.last()?);
        let span = last - first;
        if self.times.len() < 2 || span <= 0.0 {
            return None;
        }
        Some(60.0 * (self.times.len() - 1) as f64 / span)
    }
}

impl From<Vec<f64>> for BeatGrid {
    fn from(times: Vec<f64>) -> Self {
        Self::from_secs(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples() {
        let grid = BeatGrid::from_samples(&[0, 22050, 44100], 44100);
        assert_eq!(grid.times(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_strictly_increasing() {
        assert!(BeatGrid::from_secs(vec![0.5, 1.0, 1.5]).is_strictly_increasing());
        assert!(!BeatGrid::from_secs(vec![0.5, 0.5, 1.5]).is_strictly_increasing());
        assert!(BeatGrid::default().is_strictly_increasing());
    }

    #[test]
    fn test_mean_bpm() {
        let grid = BeatGrid::from_secs(vec![1.0, 1.5, 2.0, 2.5]);
        assert!((grid.mean_bpm().unwrap() - 120.0).abs() < 1e-9);
        assert_eq!(BeatGrid::from_secs(vec![1.0]).mean_bpm(), None);
        assert_eq!(BeatGrid::default().mean_bpm(), None);
    }

    #[test]
    fn test_nearest_index() {
        let grid = BeatGrid::from_secs(vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(grid.nearest_index(0.0), Some(0));
        assert_eq!(grid.nearest_index(1.0), Some(1));
        assert_eq!(grid.nearest_index(1.2), Some(1));
        assert_eq!(grid.nearest_index(1.3), Some(2));
        // midway between beats picks the earlier one
        assert_eq!(grid.nearest_index(1.75), Some(2));
        assert_eq!(grid.nearest_index(9.0), Some(3));
        assert_eq!(grid.nearest_index(f64::NAN), None);
        assert_eq!(BeatGrid::default().nearest_index(1.0), None);
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let grid = BeatGrid::from_secs(vec![0.5, 1.0]);
        assert_eq!(serde_json::to_string(&grid).unwrap(), "[0.5,1.0]");
        let back: BeatGrid = serde_json::from_str("[0.25,0.75]").unwrap();
        assert_eq!(back.times(), &[0.25, 0.75]);
    }
}
