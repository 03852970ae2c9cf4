use serde::{Deserialize, Serialize};

use super::BeatGrid;
use crate::error::WarpError;

/// Default pull toward the ideal grid; keeps some of the original feel.
const DEFAULT_STRENGTH: f64 = 0.7;

/// Parameters for pulling a detected grid toward a fixed tempo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridCorrectionSettings {
    /// Tempo of the ideal grid, in beats per minute.
    pub target_bpm: f64,
    /// Blend factor in [0, 1]: 0 leaves beats untouched, 1 snaps them fully.
    pub strength: f64,
    /// Index of the beat the ideal grid is laid out from. Out-of-range
    /// values are clamped to the grid.
    pub anchor_index: usize,
}

impl Default for GridCorrectionSettings {
    fn default() -> Self {
        Self {
            target_bpm: 120.0,
            strength: DEFAULT_STRENGTH,
            anchor_index: 0,
        }
    }
}

impl GridCorrectionSettings {
    /// Settings for the given target tempo with default strength and anchor.
    ///
    /// # Errors
    /// Returns [`WarpError::InvalidSettings`] if `target_bpm` is not positive
    /// and finite.
    pub fn new(target_bpm: f64) -> Result<Self, WarpError> {
        let settings = Self {
            target_bpm,
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Set the correction strength, clamped to [0, 1].
    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        };
        self
    }

    /// Set the anchor beat index.
    pub fn with_anchor_index(mut self, anchor_index: usize) -> Self {
        self.anchor_index = anchor_index;
        self
    }

    /// Seconds between beats of the ideal grid.
    #[inline]
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.target_bpm
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), WarpError> {
        if !self.target_bpm.is_finite() || self.target_bpm <= 0.0 {
            return Err(WarpError::InvalidSettings(format!(
                "target BPM must be positive and finite, got {}",
                self.target_bpm
            )));
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(WarpError::InvalidSettings(format!(
                "strength must be within [0, 1], got {}",
                self.strength
            )));
        }
        Ok(())
    }
}

/// Computes the corrected (destination) grid for a detected grid.
///
/// The ideal grid starts at the anchor beat's time and steps one beat
/// period per index: `ideal[i] = anchor + i * spb`. Each output beat is
/// `source + strength * (ideal - source)`. Output values are not clamped: with
/// a non-zero anchor index the whole grid shifts later, and beats can land
/// past the end of the recording.
///
/// # Errors
/// Returns [`WarpError::InvalidSettings`] if the settings fail validation.
pub fn correct_grid(
    source: &BeatGrid,
    settings: &GridCorrectionSettings,
) -> Result<BeatGrid, WarpError> {
    settings.validate()?;
    let beats = source.times();
    if beats.is_empty() {
        return Ok(BeatGrid::default());
    }

    let spb = settings.seconds_per_beat();
    let anchor_index = settings.anchor_index.min(beats.len() - 1);
    let anchor = beats[anchor_index];
    let strength = settings.strength;

    let corrected: Vec<f64> = beats
        .iter()
        .enumerate()
        .map(|(i, &beat)| {
            let ideal = anchor + i as f64 * spb;
            beat + strength * (ideal - beat)
        })
        .collect();

    if let (Some(&first), Some(&last), Some(&source_last)) =
        (corrected.first(), corrected.last(), beats.last())
    {
        if first < 0.0 {
            log::warn!(
                "corrected grid starts at {:.4}s (anchor beat {} at {:.4}s, {} BPM); \
                 negative beat times are kept as-is",
                first,
                anchor_index,
                anchor,
                settings.target_bpm
            );
        }
        if last > source_last + spb {
            log::warn!(
                "corrected grid ends at {:.4}s, {:.4}s past the last detected beat \
                 (anchor beat {} at {:.4}s); beats past the audio are skipped",
                last,
                last - source_last,
                anchor_index,
                anchor
            );
        }
    }

    Ok(BeatGrid::from_secs(corrected))
}
