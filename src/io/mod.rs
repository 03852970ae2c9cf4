//! Audio container I/O.

pub mod wav;

pub use wav::{read_wav, read_wav_file, write_wav, write_wav_file, WavEncoding};
