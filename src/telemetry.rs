//! Hand-off between the audio thread and the display side.
//!
//! The audio thread never waits here: buffers are published with `try_lock`
//! and dropped if a reader holds the lock; counters are plain atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::ModulationScheme;

/// Cost of the last processed buffer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub latency_ms: f64,
    /// Latency as a share of the buffer's real-time duration
    pub utilization_pct: f64,
}

impl Metrics {
    pub fn new(latency: Duration, buffer_duration_ms: f64) -> Self {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let utilization_pct = if buffer_duration_ms > 0.0 {
            latency_ms / buffer_duration_ms * 100.0
        } else {
            0.0
        };
        Self {
            latency_ms,
            utilization_pct,
        }
    }

    /// Processing took longer than the audio it produced
    pub fn is_overrun(&self) -> bool {
        self.utilization_pct > 100.0
    }
}

/// Counters accumulated over the run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    pub buffers: u64,
    pub overruns: u64,
    pub peak_latency_ms: f64,
    /// Non-finite input samples replaced with silence
    pub sanitized_samples: u64,
    /// Buffers the recorder could not take because its queue was full
    pub dropped_record_buffers: u64,
}

/// Latest buffers for waveform and spectrum display
#[derive(Debug, Clone)]
pub struct TelemetryFrame {
    pub demodulated: Vec<f32>,
    pub output: Vec<f32>,
    pub scheme: ModulationScheme,
    /// Incremented on every publish
    pub sequence: u64,
}

pub struct Telemetry {
    frame: Mutex<TelemetryFrame>,
    latency_bits: AtomicU64,
    utilization_bits: AtomicU64,
    peak_latency_bits: AtomicU64,
    buffers: AtomicU64,
    overruns: AtomicU64,
    sanitized: AtomicU64,
    dropped_record: AtomicU64,
}

impl Telemetry {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            frame: Mutex::new(TelemetryFrame {
                demodulated: Vec::with_capacity(buffer_size),
                output: Vec::with_capacity(buffer_size),
                scheme: ModulationScheme::default(),
                sequence: 0,
            }),
            latency_bits: AtomicU64::new(0f64.to_bits()),
            utilization_bits: AtomicU64::new(0f64.to_bits()),
            peak_latency_bits: AtomicU64::new(0f64.to_bits()),
            buffers: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            sanitized: AtomicU64::new(0),
            dropped_record: AtomicU64::new(0),
        }
    }

    /// Copy the latest buffers in, unless a reader is holding them.
    /// Returns false when the publish was skipped.
    pub fn publish(&self, demodulated: &[f32], output: &[f32], scheme: ModulationScheme) -> bool {
        let Ok(mut frame) = self.frame.try_lock() else {
            return false;
        };
        // Capacity is reserved up front, so this does not allocate for
        // buffers up to the configured size
        frame.demodulated.clear();
        frame.demodulated.extend_from_slice(demodulated);
        frame.output.clear();
        frame.output.extend_from_slice(output);
        frame.scheme = scheme;
        frame.sequence += 1;
        true
    }

    pub fn record(&self, metrics: Metrics) {
        self.latency_bits
            .store(metrics.latency_ms.to_bits(), Ordering::Relaxed);
        self.utilization_bits
            .store(metrics.utilization_pct.to_bits(), Ordering::Relaxed);
        // Non-negative f64 bit patterns order the same as the values
        self.peak_latency_bits
            .fetch_max(metrics.latency_ms.to_bits(), Ordering::Relaxed);
        self.buffers.fetch_add(1, Ordering::Relaxed);
        if metrics.is_overrun() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn note_sanitized(&self, count: u64) {
        self.sanitized.fetch_add(count, Ordering::Relaxed);
    }

    pub fn note_dropped_record(&self) {
        self.dropped_record.fetch_add(1, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            latency_ms: f64::from_bits(self.latency_bits.load(Ordering::Relaxed)),
            utilization_pct: f64::from_bits(self.utilization_bits.load(Ordering::Relaxed)),
        }
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            buffers: self.buffers.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            peak_latency_ms: f64::from_bits(self.peak_latency_bits.load(Ordering::Relaxed)),
            sanitized_samples: self.sanitized.load(Ordering::Relaxed),
            dropped_record_buffers: self.dropped_record.load(Ordering::Relaxed),
        }
    }

    /// Clone of the latest published buffers, None before the first publish
    pub fn snapshot(&self) -> Option<TelemetryFrame> {
        let frame = self.frame.lock().unwrap_or_else(|e| e.into_inner());
        if frame.sequence == 0 {
            None
        } else {
            Some(frame.clone())
        }
    }
}
