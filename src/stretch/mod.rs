//! Pitch-preserving stretch backends.
//!
//! A [`StretchBackend`] stretches one channel of one segment to a new
//! duration. The warp engine never inspects which implementation it holds:
//! [`BackendKind::resolve`] picks the concrete kind once, and every worker
//! builds its own instance through [`BackendKind::create`].

pub mod phase_vocoder;
#[cfg(feature = "signalsmith")]
pub mod signalsmith;

pub use phase_vocoder::PhaseVocoder;
#[cfg(feature = "signalsmith")]
pub use signalsmith::SignalsmithStretcher;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WarpError;

/// Fastest rate a backend will apply (4x shorter).
pub const MAX_RATE: f64 = 4.0;
/// Slowest rate a backend will apply (4x longer).
pub const MIN_RATE: f64 = 0.25;

/// Stretches a mono segment without changing its pitch.
pub trait StretchBackend: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Stretches `segment` by `rate = original_duration / desired_duration`
    /// (>1 shortens, <1 lengthens). The rate is clamped to
    /// [`MIN_RATE`]..=[`MAX_RATE`]. The result is close to
    /// `segment.len() / rate` samples but callers must not rely on the exact
    /// length.
    fn stretch(
        &mut self,
        segment: &[f32],
        sample_rate: u32,
        rate: f64,
    ) -> Result<Vec<f32>, WarpError>;
}

/// Stretch backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Highest-quality backend compiled into this build.
    #[default]
    Auto,
    /// signalsmith-stretch (native, requires the `signalsmith` feature).
    Signalsmith,
    /// Pure-Rust phase vocoder, always available.
    PhaseVocoder,
}

impl BackendKind {
    /// All selectable kinds, in preference order after `Auto`.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Auto,
        BackendKind::Signalsmith,
        BackendKind::PhaseVocoder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::Signalsmith => "signalsmith",
            BackendKind::PhaseVocoder => "phase-vocoder",
        }
    }

    /// Whether this kind can run in the current build.
    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Auto | BackendKind::PhaseVocoder => true,
            BackendKind::Signalsmith => cfg!(feature = "signalsmith"),
        }
    }

    /// Resolves `Auto` to the best available backend.
    ///
    /// # Errors
    /// Returns [`WarpError::BackendUnavailable`] if a specific backend was
    /// requested and is not compiled in. Only `Auto` falls back.
    pub fn resolve(self) -> Result<BackendKind, WarpError> {
        match self {
            BackendKind::Auto if BackendKind::Signalsmith.is_available() => {
                Ok(BackendKind::Signalsmith)
            }
            BackendKind::Auto => Ok(BackendKind::PhaseVocoder),
            kind if kind.is_available() => Ok(kind),
            kind => Err(WarpError::BackendUnavailable(kind)),
        }
    }

    /// Builds a fresh backend instance for the resolved kind.
    pub fn create(self) -> Result<Box<dyn StretchBackend>, WarpError> {
        match self.resolve()? {
            BackendKind::PhaseVocoder => Ok(Box::new(PhaseVocoder::new())),
            #[cfg(feature = "signalsmith")]
            BackendKind::Signalsmith => Ok(Box::new(SignalsmithStretcher::new())),
            other => Err(WarpError::BackendUnavailable(other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = WarpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "signalsmith" => Ok(BackendKind::Signalsmith),
            "phase-vocoder" | "phase_vocoder" | "pv" => Ok(BackendKind::PhaseVocoder),
            other => Err(WarpError::InvalidOptions(format!(
                "unknown stretch backend '{}' (use auto, signalsmith, or phase-vocoder)",
                other
            ))),
        }
    }
}

/// Validates a stretch rate and clamps it to the supported range.
pub fn clamp_rate(rate: f64) -> Result<f64, WarpError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(WarpError::Backend(format!(
            "stretch rate must be positive and finite, got {}",
            rate
        )));
    }
    Ok(rate.clamp(MIN_RATE, MAX_RATE))
}

/// Number of output samples for `len` input samples at `rate`.
#[inline]
pub fn stretched_len(len: usize, rate: f64) -> usize {
    if len == 0 {
        return 0;
    }
    ((len as f64 / rate).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_always_resolves() {
        let resolved = BackendKind::Auto.resolve().unwrap();
        assert_ne!(resolved, BackendKind::Auto);
        if cfg!(feature = "signalsmith") {
            assert_eq!(resolved, BackendKind::Signalsmith);
        } else {
            assert_eq!(resolved, BackendKind::PhaseVocoder);
        }
    }

    #[test]
    fn test_phase_vocoder_always_available() {
        assert_eq!(
            BackendKind::PhaseVocoder.resolve().unwrap(),
            BackendKind::PhaseVocoder
        );
        assert_eq!(BackendKind::PhaseVocoder.create().unwrap().name(), "phase-vocoder");
    }

    #[cfg(not(feature = "signalsmith"))]
    #[test]
    fn test_explicit_unavailable_backend_is_an_error() {
        assert_eq!(
            BackendKind::Signalsmith.resolve(),
            Err(WarpError::BackendUnavailable(BackendKind::Signalsmith))
        );
        assert!(BackendKind::Signalsmith.create().is_err());
    }

    #[test]
    fn test_parse_and_display() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!("PV".parse::<BackendKind>().unwrap(), BackendKind::PhaseVocoder);
        assert!("rubber".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BackendKind::PhaseVocoder).unwrap();
        assert_eq!(json, "\"phase-vocoder\"");
        let kind: BackendKind = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(kind, BackendKind::Auto);
    }

    #[test]
    fn test_clamp_rate() {
        assert_eq!(clamp_rate(10.0).unwrap(), MAX_RATE);
        assert_eq!(clamp_rate(0.01).unwrap(), MIN_RATE);
        assert_eq!(clamp_rate(1.25).unwrap(), 1.25);
        assert!(clamp_rate(0.0).is_err());
        assert!(clamp_rate(-1.0).is_err());
        assert!(clamp_rate(f64::NAN).is_err());
        assert!(clamp_rate(f64::INFINITY).is_err());
    }

    #[test]
    fn test_stretched_len() {
        assert_eq!(stretched_len(1000, 2.0), 500);
        assert_eq!(stretched_len(1000, 0.5), 2000);
        assert_eq!(stretched_len(3, 4.0), 1);
        assert_eq!(stretched_len(0, 1.0), 0);
    }
}
