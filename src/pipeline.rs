//! Per-buffer orchestration of the channel model.
//!
//! input -> modulate -> +noise -> demodulate -> echo -> output
//!
//! `PipelineDriver` owns every piece of DSP state. It is built once before the
//! stream starts and then only mutated in place from the audio callback.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{Controls, PipelineConfig};
use crate::dsp::{CarrierOscillator, Demodulator, EchoLine, Modulator, NoiseSource};
use crate::error::Result;
use crate::recorder::RecordTap;
use crate::telemetry::{Metrics, Telemetry};

pub struct PipelineDriver {
    config: PipelineConfig,
    controls: Controls,
    oscillator: CarrierOscillator,
    modulator: Modulator,
    noise: NoiseSource,
    demodulator: Demodulator,
    echo: EchoLine,
    demodulated: Vec<f32>,
    demodulated_len: usize,
    recorder: Option<RecordTap>,
    telemetry: Arc<Telemetry>,
    last_metrics: Metrics,
}

impl PipelineDriver {
    /// Build all DSP state. `seed` fixes the channel noise sequence.
    pub fn new(
        config: PipelineConfig,
        controls: Controls,
        telemetry: Arc<Telemetry>,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;

        let noise_std = controls.snapshot().noise_std;
        let noise = match seed {
            Some(seed) => NoiseSource::with_seed(noise_std, seed),
            None => NoiseSource::new(noise_std),
        };

        Ok(Self {
            oscillator: CarrierOscillator::new(config.carrier_hz, config.sample_rate),
            modulator: Modulator::new(config.fm_deviation_hz),
            demodulator: Demodulator::new(&config),
            echo: EchoLine::new(config.echo_capacity(), config.echo_mix, config.echo_idle),
            demodulated: vec![0.0; config.buffer_size],
            demodulated_len: 0,
            noise,
            config,
            controls,
            recorder: None,
            telemetry,
            last_metrics: Metrics::default(),
        })
    }

    /// Send every processed buffer to `tap` while recording is on
    pub fn with_recorder(mut self, tap: RecordTap) -> Self {
        self.recorder = Some(tap);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn oscillator(&self) -> &CarrierOscillator {
        &self.oscillator
    }

    pub fn echo(&self) -> &EchoLine {
        &self.echo
    }

    pub fn last_metrics(&self) -> Metrics {
        self.last_metrics
    }

    /// Demodulated samples of the last block, before echo
    pub fn demodulated(&self) -> &[f32] {
        &self.demodulated[..self.demodulated_len]
    }

    /// Process one device callback. Input longer than the configured buffer
    /// is run as consecutive buffer-sized blocks; output beyond the input
    /// length is zeroed.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = input.len().min(output.len());
        let (used, rest) = output.split_at_mut(n);
        rest.fill(0.0);

        let block = self.config.buffer_size;
        for (inp, out) in input[..n].chunks(block).zip(used.chunks_mut(block)) {
            self.process_block(inp, out);
        }
    }

    fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        // One control snapshot per block; changes land on block boundaries
        let control = **self.controls.load();
        self.noise.set_std_dev(control.noise_std);

        let start = Instant::now();
        let mut sanitized = 0u64;

        for (i, (&raw, out)) in input.iter().zip(output.iter_mut()).enumerate() {
            let x = if raw.is_finite() {
                raw.clamp(-1.0, 1.0)
            } else {
                sanitized += 1;
                0.0
            };

            let modulated = self.modulator.modulate(control.scheme, x, &mut self.oscillator);
            let received = modulated + self.noise.sample();
            let recovered = self
                .demodulator
                .demodulate(control.scheme, received, &self.oscillator);
            self.demodulated[i] = recovered;

            *out = if control.echo_enabled {
                self.echo.process(recovered)
            } else {
                self.echo.bypass(recovered)
            };
        }

        let duration_ms = input.len() as f64 / self.config.sample_rate as f64 * 1000.0;
        self.last_metrics = Metrics::new(start.elapsed(), duration_ms);
        self.demodulated_len = input.len();

        if control.recording {
            if let Some(tap) = self.recorder.as_mut() {
                if !tap.push(output) {
                    self.telemetry.note_dropped_record();
                }
            }
        }

        self.telemetry.record(self.last_metrics);
        if sanitized > 0 {
            self.telemetry.note_sanitized(sanitized);
        }
        self.telemetry
            .publish(&self.demodulated[..input.len()], output, control.scheme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControlState, EchoIdle, ModulationScheme};
    use ringbuf::traits::{Consumer, Observer, Split};
    use ringbuf::HeapRb;

    fn driver(control: ControlState) -> (PipelineDriver, Controls, Arc<Telemetry>) {
        let config = PipelineConfig::default();
        let controls = Controls::new(control);
        let telemetry = Arc::new(Telemetry::new(config.buffer_size));
        let driver =
            PipelineDriver::new(config, controls.clone(), telemetry.clone(), Some(7)).unwrap();
        (driver, controls, telemetry)
    }

    fn quiet(scheme: ModulationScheme) -> ControlState {
        ControlState {
            scheme,
            noise_std: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_am_zero_input_settles_to_rectified_carrier_level() {
        let (mut driver, _, _) = driver(quiet(ModulationScheme::Am));
        let input = vec![0.0f32; 256];
        let mut output = vec![0.0f32; 256];

        let mut first_block_end = 0.0;
        for i in 0..40 {
            driver.process(&input, &mut output);
            if i == 0 {
                first_block_end = output[255];
            }
        }

        // Low-pass starts at 0 (output -0.5) and rises to mean|0.5 sin| = 1/π
        let target = 1.0 / std::f32::consts::PI - 0.5;
        assert!(first_block_end > -0.5 && first_block_end < target);
        let mean = output.iter().sum::<f32>() / output.len() as f32;
        assert!((mean - target).abs() < 0.01, "mean {}", mean);
    }

    #[test]
    fn test_scheme_switch_keeps_carrier_time() {
        let (mut driver, controls, _) = driver(quiet(ModulationScheme::Am));
        let input = vec![0.2f32; 256];
        let mut output = vec![0.0f32; 256];

        driver.process(&input, &mut output);
        controls.set_scheme(ModulationScheme::Fm);
        driver.process(&input, &mut output);
        controls.set_scheme(ModulationScheme::Qam);
        driver.process(&input, &mut output);

        assert_eq!(driver.oscillator().elapsed_samples(), 768);
        let mut reference = CarrierOscillator::new(10_000.0, 44_100);
        for _ in 0..768 {
            reference.advance();
        }
        assert_eq!(driver.oscillator().tick(), reference.tick());
    }

    #[test]
    fn test_control_change_lands_on_block_boundary() {
        let (mut driver, controls, telemetry) = driver(quiet(ModulationScheme::Am));
        let input = vec![0.0f32; 512];
        let mut output = vec![0.0f32; 512];

        controls.set_scheme(ModulationScheme::Qam);
        driver.process(&input, &mut output);

        // Every QAM decision is ±0.5; an AM sample would not be
        assert!(output.iter().all(|&v| v == 0.5 || v == -0.5));
        assert_eq!(telemetry.stats().buffers, 2);
    }

    #[test]
    fn test_non_finite_input_is_sanitized() {
        let (mut driver, _, telemetry) = driver(quiet(ModulationScheme::Am));
        let mut input = vec![0.0f32; 256];
        input[3] = f32::NAN;
        input[10] = f32::INFINITY;
        input[20] = f32::NEG_INFINITY;
        let mut output = vec![0.0f32; 256];

        driver.process(&input, &mut output);
        assert!(output.iter().all(|v| v.is_finite()));
        assert_eq!(telemetry.stats().sanitized_samples, 3);
    }

    #[test]
    fn test_echo_freeze_across_toggle() {
        let mut control = quiet(ModulationScheme::Qam);
        control.echo_enabled = true;
        let (mut driver, controls, _) = driver(control);
        assert_eq!(driver.echo().cursor(), 0);

        let input = vec![0.3f32; 256];
        let mut output = vec![0.0f32; 256];
        driver.process(&input, &mut output);
        assert_eq!(driver.echo().cursor(), 256);

        controls.set_echo(false);
        driver.process(&input, &mut output);
        assert_eq!(driver.echo().cursor(), 256);
        assert_eq!(driver.config().echo_idle, EchoIdle::Freeze);

        controls.set_echo(true);
        driver.process(&input, &mut output);
        assert_eq!(driver.echo().cursor(), 512);
    }

    #[test]
    fn test_output_longer_than_input_is_zeroed() {
        let (mut driver, _, _) = driver(quiet(ModulationScheme::Qam));
        let input = vec![0.3f32; 100];
        let mut output = vec![9.0f32; 128];
        driver.process(&input, &mut output);
        assert!(output[100..].iter().all(|&v| v == 0.0));
        assert_eq!(driver.demodulated().len(), 100);
    }

    #[test]
    fn test_recorder_gets_output_only_while_recording() {
        let (driver, controls, _) = driver(quiet(ModulationScheme::Qam));
        let (producer, mut consumer) = HeapRb::<f32>::new(4096).split();
        let mut driver = driver.with_recorder(RecordTap::new(producer));

        let input = vec![0.3f32; 256];
        let mut output = vec![0.0f32; 256];
        driver.process(&input, &mut output);
        assert_eq!(consumer.occupied_len(), 0);

        controls.set_recording(true);
        driver.process(&input, &mut output);
        let mut recorded = vec![0.0f32; 256];
        assert_eq!(consumer.pop_slice(&mut recorded), 256);
        assert_eq!(recorded, output);
    }

    #[test]
    fn test_metrics_are_published() {
        let (mut driver, _, telemetry) = driver(quiet(ModulationScheme::Fm));
        let input = vec![0.1f32; 256];
        let mut output = vec![0.0f32; 256];
        driver.process(&input, &mut output);

        let metrics = driver.last_metrics();
        assert!(metrics.latency_ms >= 0.0);
        assert_eq!(telemetry.metrics(), metrics);
        let frame = telemetry.snapshot().unwrap();
        assert_eq!(frame.output, output);
        assert_eq!(frame.demodulated, driver.demodulated());
        assert_eq!(frame.scheme, ModulationScheme::Fm);
    }
}
