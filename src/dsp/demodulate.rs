use std::f64::consts::TAU;

use super::carrier::CarrierOscillator;
use crate::config::{FmDiscriminator, ModulationScheme, PipelineConfig};

/// DC bias added by the AM modulator's `1 + x` term
const AM_BIAS: f32 = 0.5;

/// QAM decision levels
const QAM_LEVEL: f32 = 0.5;

/// Smoothing for the quadrature discriminator's correlation sums
const QUADRATURE_SMOOTHING: f64 = 0.05;

/// Recovers baseband from the received carrier.
///
/// Holds one state per scheme. Switching schemes leaves the other states
/// untouched; they pick up from their last value when switched back.
#[derive(Debug, Clone)]
pub struct Demodulator {
    am_alpha: f32,
    am_state: f32,
    fm: FmState,
    fm_policy: FmDiscriminator,
    fm_deviation_hz: f64,
}

#[derive(Debug, Clone, Default)]
struct FmState {
    prev: f32,
    prev2: f32,
    cross: f64,
    energy: f64,
}

impl Demodulator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            am_alpha: config.am_alpha,
            am_state: 0.0,
            fm: FmState::default(),
            fm_policy: config.fm_discriminator,
            fm_deviation_hz: config.fm_deviation_hz,
        }
    }

    /// Demodulate one received sample. `osc` must already have been advanced
    /// for this sample.
    pub fn demodulate(&mut self, scheme: ModulationScheme, y: f32, osc: &CarrierOscillator) -> f32 {
        match scheme {
            ModulationScheme::Am => self.envelope(y),
            ModulationScheme::Fm => match self.fm_policy {
                FmDiscriminator::Product => self.fm_product(y, osc.sample_rate()),
                FmDiscriminator::Quadrature => self.fm_quadrature(y, osc),
            },
            ModulationScheme::Qam => {
                let product = y as f64 * osc.tick().in_phase();
                if product > 0.0 {
                    QAM_LEVEL
                } else {
                    -QAM_LEVEL
                }
            }
        }
    }

    /// Rectify and single-pole low-pass
    fn envelope(&mut self, y: f32) -> f32 {
        let rectified = y.abs();
        self.am_state += self.am_alpha * (rectified - self.am_state);
        self.am_state - AM_BIAS
    }

    fn fm_product(&mut self, y: f32, sample_rate: f64) -> f32 {
        let out = (self.fm.prev as f64 * y as f64 * sample_rate) as f32;
        self.fm.prev2 = self.fm.prev;
        self.fm.prev = y;
        out
    }

    /// For a tone, y[n] + y[n-2] = 2·cos(ω)·y[n-1]. Averaging both sides
    /// over a short window gives cos(ω) and hence the instantaneous frequency.
    fn fm_quadrature(&mut self, y: f32, osc: &CarrierOscillator) -> f32 {
        let (y0, y1, y2) = (y as f64, self.fm.prev as f64, self.fm.prev2 as f64);
        self.fm.cross += QUADRATURE_SMOOTHING * (y1 * (y0 + y2) - self.fm.cross);
        self.fm.energy += QUADRATURE_SMOOTHING * (2.0 * y1 * y1 - self.fm.energy);
        self.fm.prev2 = self.fm.prev;
        self.fm.prev = y;

        if self.fm.energy <= f64::EPSILON || self.fm_deviation_hz <= 0.0 {
            return 0.0;
        }
        let cos_w = (self.fm.cross / self.fm.energy).clamp(-1.0, 1.0);
        let inst_hz = cos_w.acos() * osc.sample_rate() / TAU;
        ((inst_hz - osc.carrier_hz()) / self.fm_deviation_hz) as f32
    }

    /// AM low-pass state
    pub fn am_state(&self) -> f32 {
        self.am_state
    }

    /// Last sample seen by the FM discriminator
    pub fn fm_previous(&self) -> f32 {
        self.fm.prev
    }
}
