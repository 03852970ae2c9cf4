#![forbid(unsafe_code)]
//! Beat-grid time warping for recorded music.
//!
//! `beatwarp` straightens the timing of a performance onto an even tempo
//! without changing its pitch. A detected beat grid is pulled toward an
//! ideal grid by [`correct_grid`], then [`warp`] stretches every beat
//! interval of the audio so each source beat lands on its corrected time.
//!
//! # Quick Start
//!
//! ```
//! use beatwarp::{correct_grid, warp, AudioBuffer, BackendKind, BeatGrid};
//! use beatwarp::{GridCorrectionSettings, WarpOptions};
//!
//! // 3 seconds of 220 Hz sine at 22.05 kHz
//! let samples: Vec<f32> = (0..66150)
//!     .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 22050.0).sin())
//!     .collect();
//! let buffer = AudioBuffer::from_mono(samples, 22050).unwrap();
//!
//! // A slightly loose performance at roughly 120 BPM
//! let detected = BeatGrid::from_secs(vec![0.25, 0.74, 1.27, 1.75, 2.26]);
//! let settings = GridCorrectionSettings::new(120.0).unwrap().with_strength(1.0);
//! let corrected = correct_grid(&detected, &settings).unwrap();
//! assert!((corrected.times()[1] - 0.75).abs() < 1e-9);
//!
//! let options = WarpOptions::default().with_backend(BackendKind::PhaseVocoder);
//! let result = warp(&buffer, &detected, &corrected, &options).unwrap();
//! assert_eq!(result.backend, BackendKind::PhaseVocoder);
//! assert!(result.audio.num_frames() > 40_000);
//! ```
//!
//! # From a recording
//!
//! [`straighten_buffer`] runs the whole chain on a detected
//! [`BeatAnalysis`], and [`straighten_wav_file`] adds WAV reading, beat
//! detection and writing on top.

pub mod analysis;
pub mod core;
pub mod error;
pub mod grid;
pub mod io;
pub mod stretch;
pub mod warp;

use std::path::Path;

pub use analysis::{analyze_beats, analyze_buffer, BeatAnalysis};
pub use core::types::{AudioBuffer, Sample};
pub use error::{BeatStage, WarpError};
pub use grid::{correct_grid, BeatGrid, GridCorrectionSettings};
pub use io::WavEncoding;
pub use stretch::{BackendKind, PhaseVocoder, StretchBackend};
pub use warp::{warp, WarpOptions, WarpResult, WarpStats};

/// Corrects the detected grid of `analysis` and warps `buffer` onto it.
///
/// # Errors
/// Returns [`WarpError::InvalidBuffer`] if the analysis was made at a
/// different sample rate than `buffer`, plus any error from
/// [`correct_grid`] or [`warp`].
pub fn straighten_buffer(
    buffer: &AudioBuffer,
    analysis: &BeatAnalysis,
    settings: &GridCorrectionSettings,
    options: &WarpOptions,
) -> Result<WarpResult, WarpError> {
    if analysis.sample_rate != buffer.sample_rate {
        return Err(WarpError::InvalidBuffer(format!(
            "beat analysis at {} Hz does not match buffer at {} Hz",
            analysis.sample_rate, buffer.sample_rate
        )));
    }
    let corrected = correct_grid(&analysis.beats, settings)?;
    warp(buffer, &analysis.beats, &corrected, options)
}

/// Reads a WAV file, detects its beats, straightens it and writes the result.
///
/// Sample rate and channel layout pass through from the input file.
///
/// # Errors
/// Returns [`WarpError::Io`] if the files cannot be read or written,
/// [`WarpError::DetectionFailed`] if too few beats are found, plus any error
/// from [`straighten_buffer`].
pub fn straighten_wav_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    settings: &GridCorrectionSettings,
    options: &WarpOptions,
    encoding: WavEncoding,
) -> Result<WarpResult, WarpError> {
    let buffer = io::read_wav_file(input_path)?;
    let analysis = analyze_buffer(&buffer)?;
    let result = straighten_buffer(&buffer, &analysis, settings, options)?;
    io::write_wav_file(output_path, &result.audio, encoding)?;
    Ok(result)
}
