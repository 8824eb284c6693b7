//! Master volume

use crate::audio::node::{Effect, EffectKind};
use crate::audio::params::{ParamBank, ParamSpec};

const AMP: usize = 0;

pub static GAIN_PARAMS: [ParamSpec; 1] = [ParamSpec::new("amp", 0.0, 1.0, 0.5)];

/// Linear gain stage. Stateless; updates apply from the next block.
#[derive(Debug, Default, Clone)]
pub struct Gain;

impl Gain {
    pub fn new() -> Self {
        Self
    }
}

impl Effect for Gain {
    fn kind(&self) -> EffectKind {
        EffectKind::Gain
    }

    fn process(&mut self, params: &ParamBank, block: &mut [f32]) {
        let amp = params.get(AMP);
        for s in block.iter_mut() {
            *s *= amp;
        }
    }

    fn reset(&mut self) {}
}
