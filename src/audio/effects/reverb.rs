//! Reverb effect - Schroeder/Freeverb style algorithmic reverb.
//!
//! Eight parallel damped comb filters followed by four series allpass
//! filters. The comb feedback is derived from the requested reverb time so
//! that the tail falls by 60 dB after `time` seconds.

use crate::audio::node::{Effect, EffectKind};
use crate::audio::params::{ParamBank, ParamSpec};

const TIME: usize = 0;
const DECAY: usize = 1;
const MIX: usize = 2;

pub static REVERB_PARAMS: [ParamSpec; 3] = [
    ParamSpec::new("time", 0.0, 10.0, 2.0),
    ParamSpec::new("decay", 0.0, 100.0, 2.0),
    ParamSpec::new("mix", 0.0, 1.0, 0.5),
];

// Tuning constants (in samples at 44100 Hz)
const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const INPUT_GAIN: f32 = 0.015;

#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    damp: f32,
    filterstore: f32,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback: 0.0,
            damp: 0.0,
            filterstore: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index];
        self.filterstore = output * (1.0 - self.damp) + self.filterstore * self.damp;
        self.buffer[self.index] = input + self.filterstore * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filterstore = 0.0;
    }
}

#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    const FEEDBACK: f32 = 0.5;

    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let bufout = self.buffer[self.index];
        self.buffer[self.index] = input + bufout * Self::FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        bufout - input
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// Mono algorithmic reverb
#[derive(Debug, Clone)]
pub struct Reverb {
    sample_rate: f32,
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
    // (time, decay) the combs are tuned for
    tuned: Option<(f32, f32)>,
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        let scale = sample_rate / 44100.0;
        Self {
            sample_rate,
            combs: COMB_TUNING
                .iter()
                .map(|&t| CombFilter::new((t as f32 * scale) as usize))
                .collect(),
            allpasses: ALLPASS_TUNING
                .iter()
                .map(|&t| AllpassFilter::new((t as f32 * scale) as usize))
                .collect(),
            tuned: None,
        }
    }

    /// Comb feedback giving a 60 dB decay over `time` seconds for a loop of
    /// `delay` samples.
    pub fn comb_feedback(delay: usize, time: f32, sample_rate: f32) -> f32 {
        if time <= 0.0 {
            return 0.0;
        }
        10f32.powf(-3.0 * delay as f32 / (time * sample_rate))
    }

    /// Higher decay rates darken the tail
    pub fn damping(decay: f32) -> f32 {
        decay / (decay + 10.0)
    }

    fn retune(&mut self, time: f32, decay: f32) {
        let damp = Self::damping(decay);
        for comb in &mut self.combs {
            comb.feedback = Self::comb_feedback(comb.buffer.len(), time, self.sample_rate);
            comb.damp = damp;
        }
        self.tuned = Some((time, decay));
    }
}

impl Effect for Reverb {
    fn kind(&self) -> EffectKind {
        EffectKind::Reverb
    }

    fn process(&mut self, params: &ParamBank, block: &mut [f32]) {
        let time = params.get(TIME);
        let decay = params.get(DECAY);
        if self.tuned != Some((time, decay)) {
            self.retune(time, decay);
        }
        let mix = params.get(MIX);

        for sample in block.iter_mut() {
            let input = *sample * INPUT_GAIN;
            let mut wet = 0.0f32;
            for comb in &mut self.combs {
                wet += comb.process(input);
            }
            for allpass in &mut self.allpasses {
                wet = allpass.process(wet);
            }
            *sample = *sample * (1.0 - mix) + wet * mix;
        }
    }

    fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
    }
}
