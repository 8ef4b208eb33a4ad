use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::AudioMetadata;
use crate::error::{Error, Result};

/// Read a mono WAV file as f32 samples in [-1, 1]
pub fn read_mono_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, AudioMetadata)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(Error::Input(format!(
            "expected mono WAV, got {} channels",
            spec.channels
        )));
    }

    let samples = match spec.sample_format {
        SampleFormat::Float => read_float_samples(reader)?,
        SampleFormat::Int => read_int_samples(reader, spec.bits_per_sample)?,
    };

    let metadata = AudioMetadata {
        sample_rate: spec.sample_rate,
        total_samples: samples.len(),
    };

    Ok((samples, metadata))
}

fn read_float_samples(mut reader: WavReader<BufReader<File>>) -> Result<Vec<f32>> {
    Ok(reader.samples::<f32>().collect::<std::result::Result<_, _>>()?)
}

fn read_int_samples(mut reader: WavReader<BufReader<File>>, bits: u16) -> Result<Vec<f32>> {
    let max_val = (1i64 << (bits - 1)) as f32;
    Ok(reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<std::result::Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn test_reads_int16_as_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for v in [0i16, 16384, -32768] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, metadata) = read_mono_wav(&path).unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -1.0]);
        assert_eq!(metadata.sample_rate, 8_000);
        assert_eq!(metadata.total_samples, 3);
    }

    #[test]
    fn test_rejects_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.0f32).unwrap();
        writer.write_sample(0.0f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(read_mono_wav(&path), Err(Error::Input(_))));
    }
}
