use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{ControlState, Controls, PipelineConfig};
use crate::control::{Command, ControlSurface, HELP};
use crate::error::Result;
use crate::input::DeviceSession;
use crate::monitor::Monitor;
use crate::pipeline::PipelineDriver;
use crate::recorder::Recorder;
use crate::spectrum::{SpectrumAnalyzer, Window};
use crate::telemetry::Telemetry;

/// Seconds of audio the recorder queue can hold before dropping buffers
const RECORD_QUEUE_SECONDS: usize = 2;

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub record_path: PathBuf,
    pub window: Window,
    pub display_interval: Duration,
    pub seed: Option<u64>,
}

/// Stream microphone -> channel -> speaker until `quit` or end of stdin
pub fn run_live(config: &PipelineConfig, initial: ControlState, options: LiveOptions) -> Result<()> {
    let controls = Controls::new(ControlState {
        recording: false,
        ..initial
    });
    let telemetry = Arc::new(Telemetry::new(config.buffer_size));

    let (mut recorder, tap) = Recorder::spawn(
        &options.record_path,
        config.sample_rate,
        config.sample_rate as usize * RECORD_QUEUE_SECONDS,
        controls.clone(),
    )?;
    let driver = PipelineDriver::new(config.clone(), controls.clone(), telemetry.clone(), options.seed)?
        .with_recorder(tap);

    let session = DeviceSession::open(config, driver)?;
    let monitor = Monitor::spawn(
        telemetry.clone(),
        SpectrumAnalyzer::new(config.buffer_size, config.sample_rate, options.window),
        options.display_interval,
    )?;

    if initial.recording {
        if let Err(e) = recorder.start() {
            warn!("Recording not started: {}", e);
        }
    }

    info!(
        "Running {} at carrier {} Hz, noise {}",
        initial.scheme, config.carrier_hz, initial.noise_std
    );
    println!("{}", HELP);

    let result = {
        let mut surface = ControlSurface::new(
            controls.clone(),
            &mut recorder,
            telemetry.clone(),
            monitor.spectrum(),
        );
        control_loop(&mut surface)
    };

    // Streams first so no callback can run against released state
    session.stop();
    monitor.stop();
    recorder.shutdown();

    let stats = telemetry.stats();
    info!(
        "Processed {} buffers, {} overruns, peak latency {:.3} ms",
        stats.buffers, stats.overruns, stats.peak_latency_ms
    );
    result
}

fn control_loop(surface: &mut ControlSurface<'_>) -> Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                let reply = surface.execute(command);
                println!("{}", reply.message);
                if reply.quit {
                    break;
                }
            }
            Err(e) => println!("{}", e),
        }
    }
    Ok(())
}
