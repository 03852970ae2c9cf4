//! Beat detection: produces the source grid and tempo estimate the warp
//! engine consumes.

pub mod beat;
pub mod transient;

pub use beat::{analyze_beats, analyze_buffer, BeatAnalysis, MIN_DETECTED_BEATS};
pub use transient::{detect_onsets, onset_envelope, pick_onsets, OnsetEnvelope};
