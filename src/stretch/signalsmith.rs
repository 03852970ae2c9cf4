//! Offline adapter over signalsmith-stretch.
//!
//! The stretcher is a streaming processor with latency on both sides. Each
//! segment is processed from a reset state: the input is padded with
//! `input_latency` zeros, the tail is flushed, and the leading latency is cut
//! so the returned audio starts at the segment's first sample.

use signalsmith_stretch::Stretch;

use super::{clamp_rate, stretched_len, StretchBackend};
use crate::error::WarpError;

/// Segments are stretched one channel at a time.
const CHANNELS: u32 = 1;

/// signalsmith-stretch backend. The native stretcher is built lazily and
/// rebuilt only when the sample rate changes.
#[derive(Default)]
pub struct SignalsmithStretcher {
    stretcher: Option<(u32, Stretch)>,
}

impl SignalsmithStretcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn stretcher_for(&mut self, sample_rate: u32) -> &mut Stretch {
        if !matches!(&self.stretcher, Some((rate, _)) if *rate == sample_rate) {
            self.stretcher = None;
        }
        let (_, stretcher) = self.stretcher.get_or_insert_with(|| {
            log::debug!("building signalsmith stretcher at {} Hz", sample_rate);
            (sample_rate, Stretch::preset_default(CHANNELS, sample_rate))
        });
        stretcher
    }
}

impl StretchBackend for SignalsmithStretcher {
    fn name(&self) -> &'static str {
        "signalsmith"
    }

    fn stretch(
        &mut self,
        segment: &[f32],
        sample_rate: u32,
        rate: f64,
    ) -> Result<Vec<f32>, WarpError> {
        let rate = clamp_rate(rate)?;
        if segment.is_empty() {
            return Ok(Vec::new());
        }
        if sample_rate == 0 {
            return Err(WarpError::Backend("sample rate must be non-zero".into()));
        }
        let out_len = stretched_len(segment.len(), rate);

        let stretcher = self.stretcher_for(sample_rate);
        stretcher.reset();
        let input_latency = stretcher.input_latency();
        let output_latency = stretcher.output_latency();

        let mut padded = Vec::with_capacity(segment.len() + input_latency);
        padded.extend_from_slice(segment);
        padded.resize(segment.len() + input_latency, 0.0);

        // Output length sets the ratio for the whole call.
        let body_len = stretched_len(padded.len(), rate);
        let mut produced = vec![0.0f32; body_len + output_latency];
        let (body, tail) = produced.split_at_mut(body_len);
        stretcher.process(&padded, body);
        stretcher.flush(tail);

        let skip = (input_latency as f64 / rate).round() as usize + output_latency;
        let mut output: Vec<f32> = produced.into_iter().skip(skip).take(out_len).collect();
        output.resize(out_len, 0.0);
        Ok(output)
    }
}
