//! Live duplex audio through cpal.
//!
//! The input callback pushes microphone samples into a ring; the output
//! callback pops a block, runs it through the pipeline and writes the result
//! to the speaker.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::pipeline::PipelineDriver;

/// Microphone ring size, in buffers
const INPUT_RING_BUFFERS: usize = 8;

/// Largest block handed to the pipeline per pass, in buffers
const MAX_BLOCK_BUFFERS: usize = 4;

/// Open input and output streams.
///
/// Field order matters: the output stream owns the pipeline and is dropped
/// (and its callback stopped) before anything else.
pub struct DeviceSession {
    output: cpal::Stream,
    input: cpal::Stream,
}

impl DeviceSession {
    /// Open the default devices as mono f32 at the configured rate and
    /// buffer size and start streaming. Failure here is fatal to a live run.
    pub fn open(config: &PipelineConfig, driver: PipelineDriver) -> Result<Self> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());

        let input_device = host
            .default_input_device()
            .ok_or_else(|| Error::Device("no audio input device found".into()))?;
        let output_device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("no audio output device found".into()))?;
        info!(
            "Input: {}, output: {}",
            input_device.name().unwrap_or_else(|_| "<unknown>".into()),
            output_device.name().unwrap_or_else(|_| "<unknown>".into())
        );

        let stream_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size as u32),
        };
        info!(
            "Stream: {} Hz mono, {} samples ({:.1} ms)",
            config.sample_rate,
            config.buffer_size,
            config.buffer_duration_ms()
        );

        let ring = HeapRb::<f32>::new(config.buffer_size * INPUT_RING_BUFFERS);
        let (mut mic_tx, mut mic_rx) = ring.split();

        let input = input_device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Overflow drops the newest samples
                    mic_tx.push_slice(data);
                },
                |err| error!("Input stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Device(format!("failed to build input stream: {}", e)))?;

        let mut driver = driver;
        let mut scratch = vec![0.0f32; config.buffer_size * MAX_BLOCK_BUFFERS];
        let output = output_device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for out in data.chunks_mut(scratch.len()) {
                        let block = &mut scratch[..out.len()];
                        let got = mic_rx.pop_slice(block);
                        // Underrun plays silence into the channel
                        block[got..].fill(0.0);
                        driver.process(block, out);
                        for sample in out.iter_mut() {
                            *sample = sample.clamp(-1.0, 1.0);
                        }
                    }
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Device(format!("failed to build output stream: {}", e)))?;

        input
            .play()
            .map_err(|e| Error::Device(format!("failed to start input stream: {}", e)))?;
        output
            .play()
            .map_err(|e| Error::Device(format!("failed to start output stream: {}", e)))?;
        info!("Audio streams running");

        Ok(Self { output, input })
    }

    /// Stop both streams. Returns once the callbacks can no longer run, after
    /// which the pipeline state has been released.
    pub fn stop(self) {
        if let Err(e) = self.output.pause() {
            error!("Failed to pause output stream: {}", e);
        }
        if let Err(e) = self.input.pause() {
            error!("Failed to pause input stream: {}", e);
        }
        drop(self.output);
        drop(self.input);
        info!("Audio streams closed");
    }
}
