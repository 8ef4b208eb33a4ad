//! Recording of the pipeline output to WAV.
//!
//! The audio thread only ever touches [`RecordTap`], which copies buffers into
//! a lock-free ring. A worker thread drains the ring into the WAV file, so
//! disk stalls never reach the callback.

use hound::WavWriter;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Controls;
use crate::error::{Error, Result};
use crate::output::create_wav_writer;

/// Where recordings go unless overridden
pub const DEFAULT_RECORD_PATH: &str = "output.wav";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

type Writer = WavWriter<BufWriter<File>>;

/// Audio-thread side of the recorder
pub struct RecordTap {
    producer: HeapProd<f32>,
}

impl RecordTap {
    pub fn new(producer: HeapProd<f32>) -> Self {
        Self { producer }
    }

    /// Queue a whole buffer. Returns false, writing nothing, if the ring
    /// cannot take all of it.
    pub fn push(&mut self, samples: &[f32]) -> bool {
        if self.producer.vacant_len() < samples.len() {
            return false;
        }
        self.producer.push_slice(samples);
        true
    }
}

enum WriterCommand {
    /// Open `path` once the previous file is closed and report the outcome
    Start {
        path: PathBuf,
        sample_rate: u32,
        reply: Sender<Result<()>>,
    },
    Stop,
    Shutdown,
}

/// Control side of the recorder: opens and closes the output file
pub struct Recorder {
    path: PathBuf,
    sample_rate: u32,
    controls: Controls,
    commands: Sender<WriterCommand>,
    worker: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Spawn the writer thread. `queue_len` is the ring size in samples.
    pub fn spawn(
        path: impl Into<PathBuf>,
        sample_rate: u32,
        queue_len: usize,
        controls: Controls,
    ) -> Result<(Self, RecordTap)> {
        let (producer, consumer) = HeapRb::<f32>::new(queue_len.max(1)).split();
        let (commands, receiver) = mpsc::channel();

        let worker_controls = controls.clone();
        let worker = thread::Builder::new()
            .name("recorder".into())
            .spawn(move || run_writer(consumer, receiver, worker_controls))?;

        let recorder = Self {
            path: path.into(),
            sample_rate,
            controls,
            commands,
            worker: Some(worker),
        };
        Ok((recorder, RecordTap::new(producer)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_recording(&self) -> bool {
        self.controls.snapshot().recording
    }

    /// Open the file and start taking buffers. On failure recording stays off.
    pub fn start(&mut self) -> Result<()> {
        if self.is_recording() {
            return Ok(());
        }
        let (reply, opened) = mpsc::channel();
        self.commands
            .send(WriterCommand::Start {
                path: self.path.clone(),
                sample_rate: self.sample_rate,
                reply,
            })
            .map_err(|_| writer_gone())?;
        opened.recv().map_err(|_| writer_gone())??;
        self.controls.set_recording(true);
        info!("Recording started: {}", self.path.display());
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }
        self.controls.set_recording(false);
        self.commands
            .send(WriterCommand::Stop)
            .map_err(|_| writer_gone())?;
        info!("Recording stopped");
        Ok(())
    }

    /// Start if stopped, stop if started. Returns the new state.
    pub fn toggle(&mut self) -> Result<bool> {
        if self.is_recording() {
            self.stop()?;
        } else {
            self.start()?;
        }
        Ok(self.is_recording())
    }

    /// Flush whatever is queued, close the file and join the writer
    pub fn shutdown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        self.controls.set_recording(false);
        let _ = self.commands.send(WriterCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Recorder thread panicked");
            }
        }
    }
}

fn writer_gone() -> Error {
    Error::Recorder("writer thread has exited".into())
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.finish();
    }
}

fn run_writer(mut consumer: HeapCons<f32>, commands: Receiver<WriterCommand>, controls: Controls) {
    let mut writer: Option<(Writer, PathBuf)> = None;
    let mut chunk = vec![0.0f32; 4096];

    loop {
        let command = match commands.recv_timeout(POLL_INTERVAL) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(WriterCommand::Shutdown),
        };

        match command {
            // Commands run in order, so a pending stop has already closed
            // the previous file before this one is truncated
            Some(WriterCommand::Start {
                path,
                sample_rate,
                reply,
            }) => {
                drain(&mut consumer, &mut writer, &mut chunk, &controls);
                close(writer.take());
                let opened = create_wav_writer(&path, sample_rate).map(|next| {
                    debug!("Writer opened {}", path.display());
                    writer = Some((next, path));
                });
                let _ = reply.send(opened);
            }
            Some(WriterCommand::Stop) => {
                drain(&mut consumer, &mut writer, &mut chunk, &controls);
                close(writer.take());
            }
            Some(WriterCommand::Shutdown) => {
                drain(&mut consumer, &mut writer, &mut chunk, &controls);
                close(writer.take());
                break;
            }
            None => drain(&mut consumer, &mut writer, &mut chunk, &controls),
        }
    }
}

/// Move queued samples to the file. Without an open file they are discarded.
fn drain(
    consumer: &mut HeapCons<f32>,
    writer: &mut Option<(Writer, PathBuf)>,
    chunk: &mut [f32],
    controls: &Controls,
) {
    loop {
        let n = consumer.pop_slice(chunk);
        if n == 0 {
            break;
        }
        let Some((file, path)) = writer.as_mut() else {
            continue;
        };
        let failed = chunk[..n]
            .iter()
            .try_for_each(|&sample| file.write_sample(sample))
            .err();
        if let Some(e) = failed {
            warn!("Write to {} failed, recording stopped: {}", path.display(), e);
            controls.set_recording(false);
            close(writer.take());
        }
    }
}

fn close(writer: Option<(Writer, PathBuf)>) {
    if let Some((file, path)) = writer {
        match file.finalize() {
            Ok(()) => info!("Saved recording: {}", path.display()),
            Err(e) => warn!("Failed to finalize {}: {}", path.display(), e),
        }
    }
}
