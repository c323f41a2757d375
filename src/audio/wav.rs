//! 16-bit PCM WAV encoding for finished recordings.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::error::CaptureError;

/// Scale a float sample into i16 range, saturating at the rails.
fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Write interleaved f32 samples as a 16-bit PCM WAV file.
pub fn write_pcm16(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<(), CaptureError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(to_i16(sample))?;
    }
    writer.finalize()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_conversion_saturates() {
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(1.0), 32767);
        assert_eq!(to_i16(2.0), 32767);
        assert_eq!(to_i16(-2.0), -32768);
    }

    #[test]
    fn test_written_file_duration_matches_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        // 1.5 seconds of stereo audio at 48 kHz.
        let samples = vec![0.25f32; 48_000 * 2 * 3 / 2];
        write_pcm16(&path, &samples, 48_000, 2).unwrap();

        let reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.bits_per_sample, 16);

        let frames = reader.duration();
        let duration = frames as f64 / spec.sample_rate as f64;
        assert!((duration - 1.5).abs() < 1.0 / 48_000.0);
    }

    #[test]
    fn test_round_trip_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.wav");

        write_pcm16(&path, &[0.5, -0.5, 1.0], 16_000, 1).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        let values: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(values, vec![16383, -16383, 32767]);
    }
}
