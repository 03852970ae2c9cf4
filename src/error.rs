//! Error types for the beatwarp crate.

use thiserror::Error;

use crate::stretch::BackendKind;

/// Errors that can occur while correcting a beat grid or warping audio.
///
/// Validation errors abort a warp before any audio is produced. Segment-level
/// anomalies (degenerate or too-short segments) are not errors; they are
/// reported through [`crate::warp::WarpStats`] and the log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WarpError {
    /// Fewer beats than the warp needs, either as supplied or after
    /// duplicate/non-increasing beats were dropped.
    #[error("not enough usable beats {stage}: {found} found, at least {required} required")]
    InsufficientBeats {
        found: usize,
        required: usize,
        stage: BeatStage,
    },
    /// Source and target grids have different lengths.
    #[error("beat grid length mismatch: source has {source_len}, target has {target_len}")]
    LengthMismatch { source_len: usize, target_len: usize },
    /// An explicitly requested stretch backend is not compiled into this build.
    #[error("stretch backend '{0}' is not available in this build")]
    BackendUnavailable(BackendKind),
    /// Grid correction settings out of range.
    #[error("invalid grid settings: {0}")]
    InvalidSettings(String),
    /// Warp options out of range.
    #[error("invalid warp options: {0}")]
    InvalidOptions(String),
    /// Buffer shape or sample rate is unusable.
    #[error("invalid audio buffer: {0}")]
    InvalidBuffer(String),
    /// Input contains NaN or infinite samples.
    #[error("input contains NaN or infinite samples")]
    NonFiniteInput,
    /// A stretch backend failed on a segment.
    #[error("stretch backend failed: {0}")]
    Backend(String),
    /// Beat detection could not produce a usable grid.
    #[error("beat detection failed: {0}")]
    DetectionFailed(String),
    /// File or container I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Where in the warp a beat count check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatStage {
    /// The grids as the caller supplied them.
    Supplied,
    /// After duplicate and non-increasing beats were dropped.
    AfterCleaning,
}

impl std::fmt::Display for BeatStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeatStage::Supplied => write!(f, "as supplied"),
            BeatStage::AfterCleaning => write!(f, "after cleaning (too many invalid beats)"),
        }
    }
}

impl From<std::io::Error> for WarpError {
    fn from(err: std::io::Error) -> Self {
        WarpError::Io(err.to_string())
    }
}

impl From<hound::Error> for WarpError {
    fn from(err: hound::Error) -> Self {
        WarpError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_beats_display() {
        let err = WarpError::InsufficientBeats {
            found: 3,
            required: 4,
            stage: BeatStage::Supplied,
        };
        let msg = err.to_string();
        assert!(msg.contains("as supplied"), "{}", msg);
        assert!(msg.contains('3') && msg.contains('4'), "{}", msg);

        let err = WarpError::InsufficientBeats {
            found: 2,
            required: 4,
            stage: BeatStage::AfterCleaning,
        };
        assert!(err.to_string().contains("too many invalid beats"));
    }

    #[test]
    fn test_length_mismatch_display() {
        let err = WarpError::LengthMismatch {
            source_len: 8,
            target_len: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains('8') && msg.contains('7'), "{}", msg);
    }

    #[test]
    fn test_backend_unavailable_names_backend() {
        let err = WarpError::BackendUnavailable(BackendKind::Signalsmith);
        assert!(err.to_string().contains("signalsmith"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wav");
        let err: WarpError = io.into();
        assert!(matches!(err, WarpError::Io(ref m) if m.contains("missing.wav")));
    }
}
