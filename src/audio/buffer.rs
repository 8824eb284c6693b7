//! Audio Buffer implementation

use super::MAX_FRAMES;

/// モノラルオーディオバッファ
///
/// Fixed capacity so the audio path never allocates.
pub struct AudioBuffer {
    data: Box<[f32; MAX_FRAMES]>,
    valid_frames: usize,
    /// Cached peak level (updated during process)
    peak: f32,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self {
            data: Box::new([0.0; MAX_FRAMES]),
            valid_frames: 0,
            peak: 0.0,
        }
    }

    /// Clear the buffer (fill with zeros)
    pub fn clear(&mut self, frames: usize) {
        let frames = frames.min(MAX_FRAMES);
        self.data[..frames].fill(0.0);
        self.valid_frames = frames;
        self.peak = 0.0;
    }

    /// Get the number of valid frames
    pub fn valid_frames(&self) -> usize {
        self.valid_frames
    }

    /// Get samples as a slice
    pub fn samples(&self) -> &[f32] {
        &self.data[..self.valid_frames]
    }

    /// Get samples as a mutable slice
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data[..self.valid_frames]
    }

    /// Get cached peak level without recalculating
    pub fn cached_peak(&self) -> f32 {
        self.peak
    }

    /// Update peak cache
    pub fn update_peak(&mut self) {
        self.peak = self.data[..self.valid_frames]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
    }

    /// Write raw samples directly into the buffer
    pub fn write_samples(&mut self, samples: &[f32]) {
        let frames = samples.len().min(MAX_FRAMES);
        self.data[..frames].copy_from_slice(&samples[..frames]);
        self.valid_frames = frames;
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}
