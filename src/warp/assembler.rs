//! Overlap-add stitching of stretched segments.

use crate::core::window::{apply_window, linear_ramp};
use crate::core::Sample;

/// Segments need this many samples beyond two fade lengths to be faded.
const FADE_MARGIN: usize = 8;

/// Applies a linear fade-in over the first `crossfade` samples and a linear
/// fade-out over the last `crossfade` samples. Segments shorter than
/// `2 * crossfade + 8` samples are left untouched. Returns whether the fades
/// were applied.
pub fn apply_edge_fades(segment: &mut [Sample], crossfade: usize) -> bool {
    if crossfade == 0 || segment.len() < 2 * crossfade + FADE_MARGIN {
        return false;
    }
    let tail_start = segment.len() - crossfade;
    apply_window(&mut segment[..crossfade], &linear_ramp(crossfade, 0.0, 1.0));
    apply_window(&mut segment[tail_start..], &linear_ramp(crossfade, 1.0, 0.0));
    true
}

/// Grows one planar output buffer from multi-channel segments delivered in
/// time order.
///
/// Adjacent segments overlap by `crossfade` samples when both sides are at
/// least that long; the pre-faded tail and head are summed. Otherwise the
/// segment is appended without overlap.
#[derive(Debug, Clone)]
pub struct OverlapAddAssembler {
    channels: Vec<Vec<Sample>>,
    crossfade: usize,
    segments: usize,
}

impl OverlapAddAssembler {
    pub fn new(num_channels: usize, crossfade: usize) -> Self {
        Self {
            channels: vec![Vec::new(); num_channels],
            crossfade,
            segments: 0,
        }
    }

    /// Crossfade length in samples.
    pub fn crossfade(&self) -> usize {
        self.crossfade
    }

    /// Frames assembled so far.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segments appended so far.
    pub fn segment_count(&self) -> usize {
        self.segments
    }

    /// Fades `segment` and joins it onto the running output. `segment` holds
    /// one equally long vector per channel.
    pub fn append(&mut self, mut segment: Vec<Vec<Sample>>) {
        debug_assert_eq!(segment.len(), self.channels.len());
        let seg_len = segment.first().map_or(0, Vec::len);
        for channel in segment.iter_mut() {
            apply_edge_fades(channel, self.crossfade);
        }

        let overlap = if self.segments > 0
            && self.crossfade > 0
            && self.len() >= self.crossfade
            && seg_len >= self.crossfade
        {
            self.crossfade
        } else {
            0
        };

        for (out, seg) in self.channels.iter_mut().zip(segment) {
            let tail_start = out.len() - overlap;
            for (o, s) in out[tail_start..].iter_mut().zip(&seg[..overlap]) {
                *o += s;
            }
            out.extend_from_slice(&seg[overlap..]);
        }
        self.segments += 1;
    }

    /// Consumes the assembler, returning the planar output.
    pub fn finish(self) -> Vec<Vec<Sample>> {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fades_shape() {
        let mut seg = vec![1.0; 20];
        assert!(apply_edge_fades(&mut seg, 5));
        assert_eq!(&seg[..5], &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(&seg[15..], &[1.0, 0.75, 0.5, 0.25, 0.0]);
        assert!(seg[5..15].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_short_segment_not_faded() {
        let mut seg = vec![1.0; 17];
        assert!(!apply_edge_fades(&mut seg, 5));
        assert!(seg.iter().all(|&s| s == 1.0));

        let mut seg = vec![1.0; 18];
        assert!(apply_edge_fades(&mut seg, 5));
    }

    #[test]
    fn test_zero_crossfade_concatenates() {
        let mut asm = OverlapAddAssembler::new(2, 0);
        asm.append(vec![vec![1.0, 2.0], vec![-1.0, -2.0]]);
        asm.append(vec![vec![3.0], vec![-3.0]]);
        let out = asm.finish();
        assert_eq!(out[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(out[1], vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_first_segment_is_verbatim_apart_from_fades() {
        let mut asm = OverlapAddAssembler::new(1, 4);
        asm.append(vec![vec![0.5; 30]]);
        assert_eq!(asm.len(), 30);
        assert_eq!(asm.segment_count(), 1);
    }

    #[test]
    fn test_overlap_sums_to_unity() {
        let cf = 10;
        let mut asm = OverlapAddAssembler::new(1, cf);
        asm.append(vec![vec![1.0; 100]]);
        asm.append(vec![vec![1.0; 100]]);
        let out = asm.finish();
        assert_eq!(out[0].len(), 190);
        // across the joint the fade-out and fade-in sum to one
        for (i, &s) in out[0][90..100].iter().enumerate() {
            assert!((s - 1.0).abs() < 1e-6, "sample {} = {}", 90 + i, s);
        }
    }

    #[test]
    fn test_short_segment_concatenates() {
        let mut asm = OverlapAddAssembler::new(1, 10);
        asm.append(vec![vec![1.0; 100]]);
        asm.append(vec![vec![0.25; 6]]);
        let out = asm.finish();
        assert_eq!(out[0].len(), 106);
        assert_eq!(&out[0][100..], &[0.25; 6]);
    }

    #[test]
    fn test_length_law() {
        let cf = 16;
        let lengths = [400, 380, 5, 410, 395];
        let mut asm = OverlapAddAssembler::new(1, cf);
        for &len in &lengths {
            asm.append(vec![vec![0.1; len]]);
        }
        let total: usize = lengths.iter().sum();
        // only the 5-sample segment is too short to overlap its predecessor
        assert_eq!(asm.len(), total - 3 * cf);
    }
}
