//! Real-time analog channel simulator.
//!
//! Live audio is modulated onto a synthetic carrier (AM, FM or QAM), passed
//! through additive Gaussian noise, optionally echoed, and demodulated back
//! to baseband. See [`pipeline::PipelineDriver`] for the per-buffer loop.

pub mod config;
pub mod control;
pub mod dsp;
pub mod error;
pub mod input;
pub mod live;
pub mod monitor;
pub mod offline;
pub mod output;
pub mod pipeline;
pub mod recorder;
pub mod spectrum;
pub mod telemetry;

pub use config::{ControlState, Controls, ModulationScheme, PipelineConfig};
pub use error::{Error, Result};
pub use pipeline::PipelineDriver;
