//! Carrier oscillator.
//!
//! Time is kept as a sample counter so the carrier at sample `n` depends only
//! on `n` and the sample rate, whatever schemes ran before it.

use std::f64::consts::TAU;

#[derive(Debug, Clone)]
pub struct CarrierOscillator {
    sample_rate: f64,
    carrier_hz: f64,
    elapsed: u64,
    fm_phase: f64,
}

/// Carrier state after one advance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarrierTick {
    /// Elapsed time in seconds
    pub time: f64,
    /// Carrier phase `2π·f_c·t`
    pub phase: f64,
}

impl CarrierTick {
    pub fn in_phase(&self) -> f64 {
        self.phase.sin()
    }

    pub fn quadrature(&self) -> f64 {
        self.phase.cos()
    }
}

impl CarrierOscillator {
    pub fn new(carrier_hz: f64, sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            carrier_hz,
            elapsed: 0,
            fm_phase: 0.0,
        }
    }

    /// Move time forward by one sample. Must be called exactly once per
    /// output sample.
    pub fn advance(&mut self) -> CarrierTick {
        self.elapsed += 1;
        self.tick()
    }

    /// Carrier state at the current sample without advancing
    pub fn tick(&self) -> CarrierTick {
        let time = self.elapsed as f64 / self.sample_rate;
        CarrierTick {
            time,
            phase: TAU * self.carrier_hz * time,
        }
    }

    /// Integrate one sample of instantaneous frequency `f_c + offset_hz`
    /// into the FM phase accumulator, returning the new phase.
    pub fn integrate_fm(&mut self, offset_hz: f64) -> f64 {
        self.fm_phase += TAU * (self.carrier_hz + offset_hz) / self.sample_rate;
        // Wrap to keep precision over long runs; sin() is unaffected
        if self.fm_phase >= TAU {
            self.fm_phase = self.fm_phase.rem_euclid(TAU);
        }
        self.fm_phase
    }

    pub fn elapsed_samples(&self) -> u64 {
        self.elapsed
    }

    pub fn fm_phase(&self) -> f64 {
        self.fm_phase
    }

    pub fn carrier_hz(&self) -> f64 {
        self.carrier_hz
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_counts_samples() {
        let mut osc = CarrierOscillator::new(10_000.0, 44_100);
        for _ in 0..441 {
            osc.advance();
        }
        assert_eq!(osc.elapsed_samples(), 441);
        assert!((osc.tick().time - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_first_tick_is_one_sample_in() {
        let mut osc = CarrierOscillator::new(1_000.0, 8_000);
        let tick = osc.advance();
        assert!((tick.time - 1.0 / 8_000.0).abs() < 1e-15);
        assert!((tick.in_phase() - (TAU / 8.0).sin()).abs() < 1e-12);
    }

    #[test]
    fn test_unit_amplitude() {
        let mut osc = CarrierOscillator::new(10_000.0, 44_100);
        for _ in 0..1000 {
            let tick = osc.advance();
            let mag = (tick.in_phase().powi(2) + tick.quadrature().powi(2)).sqrt();
            assert!((mag - 1.0).abs() < 1e-12, "carrier magnitude: {}", mag);
        }
    }

    #[test]
    fn test_fm_phase_stays_bounded() {
        let mut osc = CarrierOscillator::new(10_000.0, 44_100);
        for _ in 0..100_000 {
            osc.integrate_fm(5_000.0);
        }
        assert!(osc.fm_phase() >= 0.0 && osc.fm_phase() < TAU);
    }

    #[test]
    fn test_fm_integration_does_not_move_time() {
        let mut osc = CarrierOscillator::new(10_000.0, 44_100);
        osc.integrate_fm(0.0);
        osc.integrate_fm(0.0);
        assert_eq!(osc.elapsed_samples(), 0);
    }
}
