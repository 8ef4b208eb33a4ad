use crate::config::EchoIdle;

/// Feedback delay line.
///
/// The mixed output is written back, so echoes compound. Capacity is fixed
/// at construction and the cursor always stays in `[0, capacity)`.
#[derive(Debug, Clone)]
pub struct EchoLine {
    buffer: Vec<f32>,
    cursor: usize,
    mix: f32,
    idle: EchoIdle,
}

impl EchoLine {
    /// `capacity` must be non-zero
    pub fn new(capacity: usize, mix: f32, idle: EchoIdle) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            cursor: 0,
            mix,
            idle,
        }
    }

    /// Mix in the sample written one delay ago and store the result
    pub fn process(&mut self, sample: f32) -> f32 {
        let delayed = self.buffer[self.cursor];
        let out = sample + self.mix * delayed;
        self.buffer[self.cursor] = out;
        self.step();
        out
    }

    /// Echo is off for this sample
    pub fn bypass(&mut self, sample: f32) -> f32 {
        if self.idle == EchoIdle::Advance {
            self.step();
        }
        sample
    }

    fn step(&mut self) {
        self.cursor += 1;
        if self.cursor == self.buffer.len() {
            self.cursor = 0;
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn contents(&self) -> &[f32] {
        &self.buffer
    }
}
