pub mod device;
pub mod wav;

pub use device::DeviceSession;

/// Metadata about an audio source
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    pub sample_rate: u32,
    pub total_samples: usize,
}

impl AudioMetadata {
    pub fn duration_secs(&self) -> f32 {
        self.total_samples as f32 / self.sample_rate as f32
    }
}
