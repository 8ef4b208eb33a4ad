use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ControlState, Controls, PipelineConfig};
use crate::error::{Error, Result};
use crate::input::wav::read_mono_wav;
use crate::output::write_wav_float32;
use crate::pipeline::PipelineDriver;
use crate::spectrum::{SpectrumAnalyzer, SpectrumBin, Window};
use crate::telemetry::{RunStats, Telemetry};

/// Summary of an offline run
#[derive(Debug, Clone)]
pub struct OfflineReport {
    pub samples: usize,
    pub stats: RunStats,
    pub mean_latency_ms: f64,
    pub mean_utilization_pct: f64,
    /// Strongest spectral component of the last demodulated buffer
    pub peak: Option<SpectrumBin>,
}

/// Run a mono WAV file through the channel and write the processed audio.
///
/// The file is fed in buffer-sized blocks, exactly as the live callback
/// would see it.
pub fn process_file(
    input_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
    control: ControlState,
    seed: Option<u64>,
    window: Window,
) -> Result<OfflineReport> {
    let (samples, metadata) = read_mono_wav(input_path)?;
    info!(
        "Loaded {} samples at {} Hz ({:.2}s)",
        samples.len(),
        metadata.sample_rate,
        metadata.duration_secs()
    );

    if metadata.sample_rate != config.sample_rate {
        return Err(Error::Input(format!(
            "file is {} Hz but the pipeline runs at {} Hz",
            metadata.sample_rate, config.sample_rate
        )));
    }

    let (output, report) = process_samples(&samples, config, control, seed, window)?;
    write_wav_float32(output_path, &output, config.sample_rate)?;
    debug!("Wrote {}", output_path.display());

    Ok(report)
}

/// Run samples through a fresh pipeline, returning the output and a summary
pub fn process_samples(
    samples: &[f32],
    config: &PipelineConfig,
    control: ControlState,
    seed: Option<u64>,
    window: Window,
) -> Result<(Vec<f32>, OfflineReport)> {
    let controls = Controls::new(ControlState {
        recording: false,
        ..control
    });
    let telemetry = Arc::new(Telemetry::new(config.buffer_size));
    let mut driver = PipelineDriver::new(config.clone(), controls, telemetry.clone(), seed)?;

    let mut output = vec![0.0f32; samples.len()];
    let mut latency_sum = 0.0;
    let mut utilization_sum = 0.0;
    let mut last_full_block = Vec::new();

    for (block_in, block_out) in samples
        .chunks(config.buffer_size)
        .zip(output.chunks_mut(config.buffer_size))
    {
        driver.process(block_in, block_out);
        let metrics = driver.last_metrics();
        latency_sum += metrics.latency_ms;
        utilization_sum += metrics.utilization_pct;
        if block_in.len() == config.buffer_size {
            last_full_block.clear();
            last_full_block.extend_from_slice(driver.demodulated());
        }
    }

    let stats = telemetry.stats();
    let blocks = stats.buffers.max(1) as f64;
    let peak = if last_full_block.is_empty() {
        None
    } else {
        let mut analyzer = SpectrumAnalyzer::new(config.buffer_size, config.sample_rate, window);
        analyzer.analyze(&last_full_block).dominant()
    };

    let report = OfflineReport {
        samples: samples.len(),
        stats,
        mean_latency_ms: latency_sum / blocks,
        mean_utilization_pct: utilization_sum / blocks,
        peak,
    };
    Ok((output, report))
}
