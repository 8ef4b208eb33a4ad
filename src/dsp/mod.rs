//! Per-sample DSP stages

pub mod carrier;
pub mod demodulate;
pub mod echo;
pub mod modulate;
pub mod noise;

pub use carrier::{CarrierOscillator, CarrierTick};
pub use demodulate::Demodulator;
pub use echo::EchoLine;
pub use modulate::Modulator;
pub use noise::NoiseSource;
