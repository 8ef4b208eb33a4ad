use super::carrier::CarrierOscillator;
use crate::config::ModulationScheme;

/// AM carrier amplitude; `(1 + x)` keeps the envelope non-negative for |x| <= 1
const AM_CARRIER_AMPLITUDE: f64 = 0.5;

/// QAM output scale
const QAM_SCALE: f64 = 0.5;

/// Baseband level above which the quadrature rail is driven
const QAM_Q_THRESHOLD: f32 = 0.5;

/// Maps baseband samples onto the carrier
#[derive(Debug, Clone)]
pub struct Modulator {
    fm_deviation_hz: f64,
}

impl Modulator {
    pub fn new(fm_deviation_hz: f64) -> Self {
        Self { fm_deviation_hz }
    }

    /// Modulate one baseband sample. Advances the oscillator exactly once.
    pub fn modulate(
        &self,
        scheme: ModulationScheme,
        x: f32,
        osc: &mut CarrierOscillator,
    ) -> f32 {
        let tick = osc.advance();
        match scheme {
            ModulationScheme::Am => {
                ((1.0 + x as f64) * AM_CARRIER_AMPLITUDE * tick.in_phase()) as f32
            }
            ModulationScheme::Fm => {
                let phase = osc.integrate_fm(x as f64 * self.fm_deviation_hz);
                phase.sin() as f32
            }
            ModulationScheme::Qam => {
                let (i, q) = qam_symbol(x);
                (QAM_SCALE * (i * tick.in_phase() + q * tick.quadrature())) as f32
            }
        }
    }
}

/// Binary I decision with a Q rail gated on amplitude:
/// (-1,-1) (-1,0) (1,0) (1,1)
pub fn qam_symbol(x: f32) -> (f64, f64) {
    let i = if x >= 0.0 { 1.0 } else { -1.0 };
    let q = if x.abs() > QAM_Q_THRESHOLD { i } else { 0.0 };
    (i, q)
}
