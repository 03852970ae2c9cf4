//! WAV reading and writing via `hound`.
//!
//! Reads 8/16/24/32-bit integer PCM and 32-bit float files with any channel
//! count. Writes 16-bit PCM or 32-bit float.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::core::types::{AudioBuffer, Sample};
use crate::error::WarpError;

/// Output sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WavEncoding {
    /// 16-bit integer PCM, clipped to [-1, 1].
    #[default]
    Pcm16,
    /// 32-bit IEEE float.
    Float32,
}

impl WavEncoding {
    fn spec(self, channels: u16, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            WavEncoding::Pcm16 => (16, SampleFormat::Int),
            WavEncoding::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// Reads a WAV file from a byte slice.
pub fn read_wav(data: &[u8]) -> Result<AudioBuffer, WarpError> {
    decode(WavReader::new(Cursor::new(data))?)
}

/// Reads a WAV file from disk.
pub fn read_wav_file(path: impl AsRef<Path>) -> Result<AudioBuffer, WarpError> {
    let path = path.as_ref();
    let reader = WavReader::open(path)
        .map_err(|e| WarpError::Io(format!("{}: {}", path.display(), e)))?;
    decode(reader)
}

fn decode<R: Read>(reader: WavReader<R>) -> Result<AudioBuffer, WarpError> {
    let spec = reader.spec();
    let samples: Vec<Sample> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 8..=32) => {
            let scale = 1.0 / (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(WarpError::InvalidBuffer(format!(
                "unsupported WAV format: {:?}, {} bits",
                format, bits
            )))
        }
    };
    log::debug!(
        "decoded WAV: {} ch, {} Hz, {} bits, {} samples",
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        samples.len()
    );
    AudioBuffer::new(samples, spec.channels, spec.sample_rate)
}

fn encode<W: Write + Seek>(
    writer: W,
    buffer: &AudioBuffer,
    encoding: WavEncoding,
) -> Result<(), WarpError> {
    let spec = encoding.spec(buffer.channels, buffer.sample_rate);
    let mut writer = WavWriter::new(writer, spec)?;
    match encoding {
        WavEncoding::Pcm16 => {
            for &sample in &buffer.data {
                writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0).round() as i16)?;
            }
        }
        WavEncoding::Float32 => {
            for &sample in &buffer.data {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Encodes an audio buffer as WAV bytes.
pub fn write_wav(buffer: &AudioBuffer, encoding: WavEncoding) -> Result<Vec<u8>, WarpError> {
    let mut cursor = Cursor::new(Vec::new());
    encode(&mut cursor, buffer, encoding)?;
    Ok(cursor.into_inner())
}

/// Encodes an audio buffer as 16-bit PCM WAV bytes.
pub fn write_wav_16bit(buffer: &AudioBuffer) -> Result<Vec<u8>, WarpError> {
    write_wav(buffer, WavEncoding::Pcm16)
}

/// Encodes an audio buffer as 32-bit float WAV bytes.
pub fn write_wav_float(buffer: &AudioBuffer) -> Result<Vec<u8>, WarpError> {
    write_wav(buffer, WavEncoding::Float32)
}

/// Writes a WAV file to disk with the given encoding.
pub fn write_wav_file(
    path: impl AsRef<Path>,
    buffer: &AudioBuffer,
    encoding: WavEncoding,
) -> Result<(), WarpError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .map_err(|e| WarpError::Io(format!("{}: {}", path.display(), e)))?;
    encode(std::io::BufWriter::new(file), buffer, encoding)
}

/// Writes a WAV file to disk (16-bit PCM).
pub fn write_wav_file_16bit(path: impl AsRef<Path>, buffer: &AudioBuffer) -> Result<(), WarpError> {
    write_wav_file(path, buffer, WavEncoding::Pcm16)
}

/// Writes a WAV file to disk (32-bit float).
pub fn write_wav_file_float(path: impl AsRef<Path>, buffer: &AudioBuffer) -> Result<(), WarpError> {
    write_wav_file(path, buffer, WavEncoding::Float32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_roundtrip_16bit() {
        let original = AudioBuffer::from_mono(vec![0.0, 0.5, -0.5, 1.0, -1.0], 44100).unwrap();
        let wav_data = write_wav_16bit(&original).unwrap();
        let decoded = read_wav(&wav_data).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.data.len(), 5);
        // 16-bit has quantization error
        for (i, (d, o)) in decoded.data.iter().zip(&original.data).enumerate() {
            assert!((d - o).abs() < 0.001, "sample {}: {} vs {}", i, d, o);
        }
    }

    #[test]
    fn test_wav_roundtrip_float() {
        let original =
            AudioBuffer::new(vec![0.1, -0.2, 0.3, -0.4, 0.5, -0.6], 2, 48000).unwrap();
        let decoded = read_wav(&write_wav_float(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_16bit_clips_out_of_range() {
        let original = AudioBuffer::from_mono(vec![1.7, -2.0], 22050).unwrap();
        let decoded = read_wav(&write_wav_16bit(&original).unwrap()).unwrap();
        assert!((decoded.data[0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert!((decoded.data[1] + 32767.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn test_reads_24bit_multichannel() {
        let spec = WavSpec {
            channels: 3,
            sample_rate: 96000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for v in [4_194_304i32, -4_194_304, 0, 8_388_607, -8_388_608, 1] {
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        let decoded = read_wav(cursor.get_ref()).unwrap();
        assert_eq!(decoded.channels, 3);
        assert_eq!(decoded.num_frames(), 2);
        assert!((decoded.data[0] - 0.5).abs() < 1e-6);
        assert!((decoded.data[1] + 0.5).abs() < 1e-6);
        assert!((decoded.data[4] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wav_invalid_data() {
        assert!(matches!(read_wav(&[]), Err(WarpError::Io(_))));
        assert!(read_wav(b"NOT_RIFF_HEADER_AT_ALL______________________").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = read_wav_file("/nonexistent/beatwarp/input.wav").unwrap_err();
        assert!(err.to_string().contains("input.wav"));
    }
}
