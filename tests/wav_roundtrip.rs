//! WAV file round trips through the library and the full straighten chain.

mod common;

use beatwarp::io::wav::{read_wav_file, write_wav_file, WavEncoding};
use beatwarp::{straighten_wav_file, AudioBuffer, GridCorrectionSettings, WarpOptions};
use common::*;

#[test]
fn test_float_file_roundtrip_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("float.wav");
    let left = gen_sine(440.0, 48000, 4800, 0.8);
    let right = gen_sine(880.0, 48000, 4800, 0.3);
    let original = stereo(&left, &right, 48000);

    write_wav_file(&path, &original, WavEncoding::Float32).unwrap();
    let decoded = read_wav_file(&path).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_pcm16_file_roundtrip_within_quantization() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pcm16.wav");
    let original = mono(gen_sine(1000.0, 44100, 4410, 0.9), 44100);

    write_wav_file(&path, &original, WavEncoding::Pcm16).unwrap();
    let decoded = read_wav_file(&path).unwrap();
    assert_eq!(decoded.channels, 1);
    assert_eq!(decoded.sample_rate, 44100);
    assert_eq!(decoded.num_frames(), original.num_frames());
    for (i, (d, o)) in decoded.data.iter().zip(&original.data).enumerate() {
        assert!((d - o).abs() < 1.0 / 16384.0, "sample {}: {} vs {}", i, d, o);
    }
}

#[test]
fn test_write_to_missing_directory_fails() {
    let buffer = AudioBuffer::from_mono(vec![0.0; 16], 8000).unwrap();
    let err = write_wav_file("/nonexistent/beatwarp/out.wav", &buffer, WavEncoding::Pcm16)
        .unwrap_err();
    assert!(err.to_string().contains("out.wav"), "{}", err);
}

#[test]
fn test_straighten_wav_file_end_to_end() {
    let sr = 22050;
    let positions = beat_positions(sr, 120.0, 6000, 12, &[0, 250, -250, 150, -150]);
    let len = positions[positions.len() - 1] + sr as usize;
    let input = stereo(
        &gen_kick_train(sr, len, &positions),
        &gen_kick_train(sr, len, &positions),
        sr,
    );

    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("take.wav");
    let out_path = dir.path().join("take_straight.wav");
    write_wav_file(&in_path, &input, WavEncoding::Float32).unwrap();

    let settings = GridCorrectionSettings::new(120.0).unwrap().with_strength(1.0);
    let result = straighten_wav_file(
        &in_path,
        &out_path,
        &settings,
        &WarpOptions::default(),
        WavEncoding::Pcm16,
    )
    .unwrap();

    let written = read_wav_file(&out_path).unwrap();
    assert_eq!(written.channels, 2);
    assert_eq!(written.sample_rate, sr);
    assert_eq!(written.num_frames(), result.audio.num_frames());
    assert!(result.stats.stretched >= 7, "stats {:?}", result.stats);
}
