//! Mono WAV read/write helpers.
//!
//! Generated audio leaves the model as mono f32 samples at the codec rate;
//! these helpers persist it as 16-bit PCM, either to disk or into an
//! in-memory buffer for streaming responses.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::Error;
use crate::Result;

fn mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write mono samples as a 16-bit PCM WAV file.
pub fn write_wav(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
    let mut writer = WavWriter::create(path, mono_spec(sample_rate))
        .map_err(|e| Error::wav("create output file", e))?;
    write_samples(&mut writer, samples)?;
    writer.finalize().map_err(|e| Error::wav("finalize output file", e))
}

/// Encode mono samples as WAV bytes for an in-memory response body.
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    write_wav_to_writer(&mut buffer, samples, sample_rate)?;
    Ok(buffer.into_inner())
}

/// Write mono samples as WAV into any seekable writer.
pub fn write_wav_to_writer<W: Write + Seek>(
    writer: W,
    samples: &[f32],
    sample_rate: u32,
) -> Result<()> {
    let mut wav = WavWriter::new(writer, mono_spec(sample_rate))
        .map_err(|e| Error::wav("create writer", e))?;
    write_samples(&mut wav, samples)?;
    wav.finalize().map_err(|e| Error::wav("finalize writer", e))
}

fn write_samples<W: Write + Seek>(writer: &mut WavWriter<W>, samples: &[f32]) -> Result<()> {
    for &sample in samples {
        let value = sample.clamp(-1.0, 1.0);
        let scaled = (value * i16::MAX as f32).round() as i16;
        writer
            .write_sample(scaled)
            .map_err(|e| Error::wav("write sample", e))?;
    }
    Ok(())
}

/// Read a WAV file, folding all channels down to the first. Returns the
/// samples and the file's sample rate.
pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path).map_err(|e| Error::wav("open input file", e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let mut samples = Vec::new();

    match spec.sample_format {
        SampleFormat::Float => {
            for (idx, sample) in reader.samples::<f32>().enumerate() {
                let value = sample.map_err(|e| Error::wav("decode sample", e))?;
                if idx % channels == 0 {
                    samples.push(value);
                }
            }
        }
        SampleFormat::Int => {
            let max = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            for (idx, sample) in reader.samples::<i32>().enumerate() {
                let value = sample.map_err(|e| Error::wav("decode sample", e))?;
                if idx % channels == 0 {
                    samples.push(value as f32 / max);
                }
            }
        }
    }

    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn wav_roundtrip_preserves_shape() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.wav");
        let samples = vec![0.0_f32, 0.5, -0.25, 1.0];
        write_wav(&path, &samples, 16_000).expect("write wav");

        let (decoded, sample_rate) = read_wav(&path).expect("read wav");
        assert_eq!(sample_rate, 16_000);
        assert_eq!(decoded.len(), 4);
        assert!((decoded[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn wav_bytes_match_file_output() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.wav");
        let samples = vec![0.1_f32, -0.1, 0.2];
        write_wav(&path, &samples, 16_000).expect("write wav");

        let bytes = wav_bytes(&samples, 16_000).expect("encode wav");
        let on_disk = std::fs::read(&path).expect("read file");
        assert_eq!(bytes, on_disk);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let bytes = wav_bytes(&[2.0, -2.0], 16_000).expect("encode wav");
        // 44-byte header plus two i16 samples.
        assert_eq!(bytes.len(), 48);
    }
}
