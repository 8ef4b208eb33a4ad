//! Display-rate analysis of the latest demodulated buffer.
//!
//! Runs on its own thread at the display cadence, well away from the audio
//! callback. It only reads telemetry, never pipeline state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::spectrum::{SpectrumAnalyzer, SpectrumFrame};
use crate::telemetry::Telemetry;

/// Latest spectrum, replaced wholesale each tick
pub type SpectrumSlot = Arc<Mutex<Option<SpectrumFrame>>>;

pub const DEFAULT_DISPLAY_INTERVAL: Duration = Duration::from_millis(50);

pub struct Monitor {
    stop: Arc<AtomicBool>,
    spectrum: SpectrumSlot,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn spawn(
        telemetry: Arc<Telemetry>,
        analyzer: SpectrumAnalyzer,
        interval: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let spectrum: SpectrumSlot = Arc::new(Mutex::new(None));

        let thread_stop = stop.clone();
        let thread_spectrum = spectrum.clone();
        let handle = thread::Builder::new().name("monitor".into()).spawn(move || {
            let mut analyzer = analyzer;
            let mut last_sequence = 0;
            while !thread_stop.load(Ordering::Relaxed) {
                if let Some(frame) = tick(&telemetry, &mut analyzer, &mut last_sequence) {
                    *thread_spectrum.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
                }
                thread::sleep(interval);
            }
        })?;

        Ok(Self {
            stop,
            spectrum,
            handle: Some(handle),
        })
    }

    /// Shared handle to the latest spectrum
    pub fn spectrum(&self) -> SpectrumSlot {
        self.spectrum.clone()
    }

    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Monitor thread panicked");
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Analyse the latest buffer if the audio thread published a new one
pub fn tick(
    telemetry: &Telemetry,
    analyzer: &mut SpectrumAnalyzer,
    last_sequence: &mut u64,
) -> Option<SpectrumFrame> {
    let frame = telemetry.snapshot()?;
    if frame.sequence == *last_sequence {
        return None;
    }
    *last_sequence = frame.sequence;

    let spectrum = analyzer.analyze(&frame.demodulated);
    let metrics = telemetry.metrics();
    if let Some(peak) = spectrum.dominant() {
        debug!(
            "{} peak {:.0} Hz ({:.4}), rms {:.3}, latency {:.3} ms ({:.1}%)",
            frame.scheme,
            peak.frequency_hz,
            peak.magnitude,
            spectrum.rms,
            metrics.latency_ms,
            metrics.utilization_pct
        );
    }
    Some(spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModulationScheme;
    use crate::spectrum::Window;
    use std::f32::consts::PI;

    #[test]
    fn test_tick_analyses_only_new_buffers() {
        let telemetry = Telemetry::new(256);
        let mut analyzer = SpectrumAnalyzer::new(256, 44_100, Window::Rectangular);
        let mut last = 0;

        assert!(tick(&telemetry, &mut analyzer, &mut last).is_none());

        // Tone exactly on bin 10
        let tone: Vec<f32> = (0..256)
            .map(|i| (2.0 * PI * 10.0 * i as f32 / 256.0).sin())
            .collect();
        telemetry.publish(&tone, &tone, ModulationScheme::Am);

        let spectrum = tick(&telemetry, &mut analyzer, &mut last).expect("new buffer");
        assert_eq!(spectrum.dominant_bin(), Some(10));
        assert_eq!(last, 1);
        assert!(tick(&telemetry, &mut analyzer, &mut last).is_none());
    }

    #[test]
    fn test_monitor_publishes_spectrum() {
        let telemetry = Arc::new(Telemetry::new(256));
        telemetry.publish(&[0.5; 256], &[0.5; 256], ModulationScheme::Am);

        let monitor = Monitor::spawn(
            telemetry,
            SpectrumAnalyzer::new(256, 44_100, Window::Rectangular),
            Duration::from_millis(1),
        )
        .unwrap();
        let slot = monitor.spectrum();

        let mut seen = false;
        for _ in 0..500 {
            if slot.lock().unwrap().is_some() {
                seen = true;
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        monitor.stop();
        assert!(seen);
        let frame = slot.lock().unwrap().clone().unwrap();
        assert!((frame.bins[0].magnitude - 0.5).abs() < 1e-4);
    }
}
