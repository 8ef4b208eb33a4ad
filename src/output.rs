use chrono::{DateTime, Local};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::ModulationScheme;
use crate::error::Result;

/// Mono float32 format used for everything the simulator writes
pub fn mono_float_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Open a mono float32 WAV writer
pub fn create_wav_writer<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
) -> Result<WavWriter<BufWriter<File>>> {
    Ok(WavWriter::create(path, mono_float_spec(sample_rate))?)
}

/// Write processed samples to a mono float32 WAV file
pub fn write_wav_float32<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let mut writer = create_wav_writer(path, sample_rate)?;

    for &sample in samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Generate an output filename for an offline run
pub fn generate_filename(scheme: ModulationScheme, base_time: DateTime<Local>) -> String {
    format!(
        "channel_{}_{}.wav",
        scheme.to_string().to_lowercase(),
        base_time.format("%Y-%m-%d_%H-%M-%S")
    )
}
