use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

use channel_sim::config::{
    clamp_noise, ControlState, EchoIdle, FmDiscriminator, ModulationScheme, PipelineConfig, DEFAULT_AM_ALPHA,
};
use channel_sim::live::{run_live, LiveOptions};
use channel_sim::monitor::DEFAULT_DISPLAY_INTERVAL;
use channel_sim::offline::process_file;
use channel_sim::output::generate_filename;
use channel_sim::recorder::DEFAULT_RECORD_PATH;
use channel_sim::spectrum::Window;

/// Simulate an analog radio channel on live microphone audio
#[derive(Parser, Debug)]
#[command(name = "channel-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Process a mono WAV file instead of the live audio device
    #[arg(short, long, value_name = "WAV")]
    input: Option<PathBuf>,

    /// Output file for --input mode (default: timestamped name)
    #[arg(short, long, value_name = "WAV")]
    output: Option<PathBuf>,

    /// Modulation scheme
    #[arg(short, long, value_enum, default_value_t = ModulationScheme::Am)]
    scheme: ModulationScheme,

    /// Channel noise standard deviation (0.0 - 0.5)
    #[arg(short, long, default_value = "0.1")]
    noise: f32,

    /// Start with echo enabled
    #[arg(short, long)]
    echo: bool,

    /// Echo delay in milliseconds
    #[arg(long, default_value = "250")]
    echo_delay_ms: u32,

    /// Share of the delayed signal mixed back in
    #[arg(long, default_value = "0.5")]
    echo_mix: f32,

    /// What the echo line does while echo is off
    #[arg(long, value_enum, default_value_t = EchoIdle::Freeze)]
    echo_idle: EchoIdle,

    /// Carrier frequency (Hz)
    #[arg(short, long, default_value = "10000")]
    carrier: f64,

    /// FM frequency deviation (Hz)
    #[arg(short, long, default_value = "5000")]
    deviation: f64,

    /// FM demodulation method
    #[arg(long, value_enum, default_value_t = FmDiscriminator::Product)]
    fm_discriminator: FmDiscriminator,

    /// Sample rate (Hz)
    #[arg(short, long, default_value = "44100")]
    rate: u32,

    /// Samples per audio buffer
    #[arg(short, long, default_value = "256")]
    buffer_size: usize,

    /// Spectrum analysis window
    #[arg(long, value_enum, default_value_t = Window::Rectangular)]
    window: Window,

    /// Spectrum/telemetry refresh interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_DISPLAY_INTERVAL.as_millis() as u64)]
    display_interval_ms: u64,

    /// Recording destination in live mode
    #[arg(long, default_value = DEFAULT_RECORD_PATH)]
    record_path: PathBuf,

    /// Start recording immediately (live mode)
    #[arg(long)]
    record: bool,

    /// Seed for the channel noise generator
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    let config = PipelineConfig {
        sample_rate: args.rate,
        buffer_size: args.buffer_size,
        carrier_hz: args.carrier,
        fm_deviation_hz: args.deviation,
        echo_delay_ms: args.echo_delay_ms,
        echo_mix: args.echo_mix,
        am_alpha: DEFAULT_AM_ALPHA,
        fm_discriminator: args.fm_discriminator,
        echo_idle: args.echo_idle,
    };
    config.validate()?;

    let control = ControlState {
        scheme: args.scheme,
        noise_std: clamp_noise(args.noise),
        echo_enabled: args.echo,
        recording: args.record,
    };

    if let Some(input_path) = &args.input {
        // File mode
        let output_path = args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(generate_filename(args.scheme, Local::now())));
        if args.verbose {
            println!("Processing file: {}", input_path.display());
        }

        let report = process_file(
            input_path,
            &output_path,
            &config,
            control,
            args.seed,
            args.window,
        )?;

        println!(
            "Processed {} samples in {} buffers: mean latency {:.3} ms ({:.1}% of real time), peak {:.3} ms",
            report.samples,
            report.stats.buffers,
            report.mean_latency_ms,
            report.mean_utilization_pct,
            report.stats.peak_latency_ms
        );
        if let Some(peak) = report.peak {
            println!("Spectrum peak: {:.0} Hz", peak.frequency_hz);
        }
        println!("Saved to {}", output_path.display());
    } else {
        // Live mode
        if args.output.is_some() {
            eprintln!("Error: --output only applies with --input; use --record-path for live recording");
            std::process::exit(1);
        }
        run_live(
            &config,
            control,
            LiveOptions {
                record_path: args.record_path,
                window: args.window,
                display_interval: Duration::from_millis(args.display_interval_ms.max(1)),
                seed: args.seed,
            },
        )?;
    }

    Ok(())
}
