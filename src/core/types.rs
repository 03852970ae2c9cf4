use crate::error::WarpError;

/// A single audio sample (32-bit float, nominal range -1.0 to 1.0).
pub type Sample = f32;

/// Buffer holding audio samples in interleaved format.
///
/// For mono audio, samples are stored sequentially: `[s0, s1, s2, ...]`.
/// For N channels, each frame stores N consecutive samples:
/// `[c0_0, c1_0, .., cN_0, c0_1, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Raw interleaved sample data.
    pub data: Vec<Sample>,
    /// Number of channels (at least 1).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new audio buffer.
    ///
    /// # Errors
    /// Returns [`WarpError::InvalidBuffer`] if `channels` or `sample_rate` is
    /// zero, or if `data` does not hold a whole number of frames.
    pub fn new(data: Vec<Sample>, channels: u16, sample_rate: u32) -> Result<Self, WarpError> {
        if channels == 0 {
            return Err(WarpError::InvalidBuffer(
                "channel count must be at least 1".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(WarpError::InvalidBuffer(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if data.len() % channels as usize != 0 {
            return Err(WarpError::InvalidBuffer(format!(
                "{} samples is not a whole number of {}-channel frames",
                data.len(),
                channels
            )));
        }
        Ok(Self {
            data,
            channels,
            sample_rate,
        })
    }

    /// Create a mono buffer.
    pub fn from_mono(data: Vec<Sample>, sample_rate: u32) -> Result<Self, WarpError> {
        Self::new(data, 1, sample_rate)
    }

    /// Create an `AudioBuffer` from separate (planar) channel vectors.
    ///
    /// # Errors
    /// Returns an error if no channels are given or their lengths differ.
    pub fn from_channels(
        channels_data: &[Vec<Sample>],
        sample_rate: u32,
    ) -> Result<Self, WarpError> {
        if channels_data.is_empty() || channels_data.len() > u16::MAX as usize {
            return Err(WarpError::InvalidBuffer(format!(
                "unsupported channel count: {}",
                channels_data.len()
            )));
        }
        let num_frames = channels_data[0].len();
        if channels_data.iter().any(|ch| ch.len() != num_frames) {
            return Err(WarpError::InvalidBuffer(
                "all channels must have the same number of samples".to_string(),
            ));
        }
        Self::new(
            interleave(channels_data),
            channels_data.len() as u16,
            sample_rate,
        )
    }

    /// Number of frames in the buffer (total samples / channels).
    pub fn num_frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.data.len() / self.channels as usize
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Returns true if the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a single channel's data as a new vector.
    pub fn channel_data(&self, channel: u16) -> Vec<Sample> {
        if channel >= self.channels {
            return Vec::new();
        }
        self.data
            .iter()
            .skip(channel as usize)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }

    /// Splits the buffer into one vector per channel.
    pub fn to_planar(&self) -> Vec<Vec<Sample>> {
        (0..self.channels).map(|ch| self.channel_data(ch)).collect()
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> Sample {
        self.data.iter().fold(0.0, |acc: Sample, &s| acc.max(s.abs()))
    }
}

/// Interleaves per-channel vectors, truncating to the shortest channel.
pub(crate) fn interleave(channels: &[Vec<Sample>]) -> Vec<Sample> {
    let min_len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut out = Vec::with_capacity(min_len * channels.len());
    for i in 0..min_len {
        out.extend(channels.iter().map(|ch| ch[i]));
    }
    out
}
