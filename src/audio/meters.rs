//! Metering types

/// Level of one stream over the last block
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortMeter {
    pub peak: f32,
    pub rms: f32,
}

impl PortMeter {
    pub fn from_samples(samples: &[f32], peak: f32) -> Self {
        let rms = if samples.is_empty() {
            0.0
        } else {
            (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
        };
        Self { peak, rms }
    }
}

/// Levels at both taps, published once per block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainMeters {
    /// Blocks processed so far
    pub block: u64,
    pub original: PortMeter,
    pub processed: PortMeter,
}

impl ChainMeters {
    pub fn new() -> Self {
        Self::default()
    }
}
