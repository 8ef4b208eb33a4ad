use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use clap::ValueEnum;

use crate::error::{Error, Result};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BUFFER_SIZE: usize = 256;
pub const DEFAULT_CARRIER_HZ: f64 = 10_000.0;
pub const DEFAULT_FM_DEVIATION_HZ: f64 = 5_000.0;
pub const DEFAULT_ECHO_DELAY_MS: u32 = 250;
pub const DEFAULT_ECHO_MIX: f32 = 0.5;
pub const DEFAULT_NOISE_STD: f32 = 0.1;
pub const DEFAULT_AM_ALPHA: f32 = 0.01;

/// Noise level range exposed to the control surface
pub const NOISE_MIN: f32 = 0.0;
pub const NOISE_MAX: f32 = 0.5;

/// Analog scheme used to impress the baseband onto the carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModulationScheme {
    #[default]
    Am,
    Fm,
    Qam,
}

impl fmt::Display for ModulationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModulationScheme::Am => write!(f, "AM"),
            ModulationScheme::Fm => write!(f, "FM"),
            ModulationScheme::Qam => write!(f, "QAM"),
        }
    }
}

/// How the FM demodulator turns the received carrier back into baseband
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FmDiscriminator {
    /// `prev * current * sample_rate`; unscaled, dominated by the carrier
    #[default]
    Product,
    /// Three-sample autocorrelation frequency estimate, scaled to [-1, 1]
    Quadrature,
}

/// What the echo delay line does while echo is switched off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EchoIdle {
    /// Cursor and contents stay where they were
    #[default]
    Freeze,
    /// Cursor keeps moving with the stream, contents untouched
    Advance,
}

/// Fixed parameters of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub carrier_hz: f64,
    pub fm_deviation_hz: f64,
    pub echo_delay_ms: u32,
    pub echo_mix: f32,
    pub am_alpha: f32,
    pub fm_discriminator: FmDiscriminator,
    pub echo_idle: EchoIdle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            carrier_hz: DEFAULT_CARRIER_HZ,
            fm_deviation_hz: DEFAULT_FM_DEVIATION_HZ,
            echo_delay_ms: DEFAULT_ECHO_DELAY_MS,
            echo_mix: DEFAULT_ECHO_MIX,
            am_alpha: DEFAULT_AM_ALPHA,
            fm_discriminator: FmDiscriminator::default(),
            echo_idle: EchoIdle::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::config("sample_rate", "must be non-zero"));
        }
        if self.buffer_size < 2 {
            return Err(Error::config(
                "buffer_size",
                format!("must be at least 2, got {}", self.buffer_size),
            ));
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        if !(self.carrier_hz > 0.0 && self.carrier_hz < nyquist) {
            return Err(Error::config(
                "carrier_hz",
                format!("must be in (0, {}), got {}", nyquist, self.carrier_hz),
            ));
        }
        if !(self.fm_deviation_hz >= 0.0 && self.fm_deviation_hz < self.carrier_hz) {
            return Err(Error::config(
                "fm_deviation_hz",
                format!("must be in [0, carrier), got {}", self.fm_deviation_hz),
            ));
        }
        if self.echo_capacity() == 0 {
            return Err(Error::config(
                "echo_delay_ms",
                format!("delay of {} ms is shorter than one sample", self.echo_delay_ms),
            ));
        }
        if !(0.0..1.0).contains(&self.echo_mix) {
            return Err(Error::config(
                "echo_mix",
                format!("must be in [0, 1), got {}", self.echo_mix),
            ));
        }
        if !(self.am_alpha > 0.0 && self.am_alpha <= 1.0) {
            return Err(Error::config(
                "am_alpha",
                format!("must be in (0, 1], got {}", self.am_alpha),
            ));
        }
        Ok(())
    }

    /// Echo delay line length in samples
    pub fn echo_capacity(&self) -> usize {
        (self.sample_rate as u64 * self.echo_delay_ms as u64 / 1000) as usize
    }

    /// Real-time duration of one buffer in milliseconds
    pub fn buffer_duration_ms(&self) -> f64 {
        self.buffer_size as f64 / self.sample_rate as f64 * 1000.0
    }

    /// Width of one spectrum bin in Hz
    pub fn bin_width_hz(&self) -> f64 {
        self.sample_rate as f64 / self.buffer_size as f64
    }
}

/// Parameters the control surface may change while the stream runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    pub scheme: ModulationScheme,
    pub noise_std: f32,
    pub echo_enabled: bool,
    pub recording: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            scheme: ModulationScheme::Am,
            noise_std: DEFAULT_NOISE_STD,
            echo_enabled: false,
            recording: false,
        }
    }
}

/// Shared control slot.
///
/// Writers publish a whole new `ControlState`; the audio thread loads one
/// snapshot per buffer, so a change never lands mid-buffer.
#[derive(Debug, Clone)]
pub struct Controls {
    slot: Arc<ArcSwap<ControlState>>,
}

/// Bring a requested noise level into the control range; NaN means silent
pub fn clamp_noise(std_dev: f32) -> f32 {
    if std_dev.is_finite() {
        std_dev.clamp(NOISE_MIN, NOISE_MAX)
    } else {
        NOISE_MIN
    }
}

impl Controls {
    pub fn new(initial: ControlState) -> Self {
        Self {
            slot: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Lock-free read for the audio thread
    pub fn load(&self) -> Guard<Arc<ControlState>> {
        self.slot.load()
    }

    pub fn snapshot(&self) -> ControlState {
        **self.slot.load()
    }

    fn update(&self, f: impl Fn(&mut ControlState)) -> ControlState {
        let mut next = self.snapshot();
        self.slot.rcu(|current| {
            let mut state = **current;
            f(&mut state);
            next = state;
            state
        });
        next
    }

    pub fn set_scheme(&self, scheme: ModulationScheme) {
        self.update(|s| s.scheme = scheme);
    }

    /// Set the channel noise standard deviation, clamped to the control range.
    /// Returns the value actually applied.
    pub fn set_noise_std(&self, std_dev: f32) -> f32 {
        let std_dev = clamp_noise(std_dev);
        self.update(|s| s.noise_std = std_dev).noise_std
    }

    /// Flip echo on/off, returns the new state
    pub fn toggle_echo(&self) -> bool {
        self.update(|s| s.echo_enabled = !s.echo_enabled).echo_enabled
    }

    pub fn set_echo(&self, enabled: bool) {
        self.update(|s| s.echo_enabled = enabled);
    }

    pub fn set_recording(&self, recording: bool) {
        self.update(|s| s.recording = recording);
    }
}
