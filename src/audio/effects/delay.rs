//! Delay effect - mono delay line with feedback, feedback-path lowpass and mix.

use crate::audio::node::{Effect, EffectKind};
use crate::audio::params::{ParamBank, ParamSpec};
use std::f32::consts::PI;

/// Longest supported delay time. Matches the upper bound of `time`.
pub const MAX_DELAY_SECONDS: f32 = 1.0;

const TIME: usize = 0;
const FEEDBACK: usize = 1;
const LOWPASS: usize = 2;
const MIX: usize = 3;

pub static DELAY_PARAMS: [ParamSpec; 4] = [
    ParamSpec::new("time", 0.0, MAX_DELAY_SECONDS, 0.2),
    ParamSpec::new("feedback", 0.0, 1.0, 0.3),
    ParamSpec::new("lowpass", 20.0, 22050.0, 22050.0),
    ParamSpec::new("mix", 0.0, 1.0, 0.5),
];

/// Loop gain applied at `feedback = 1.0`. The feedback-path lowpass has
/// unity gain at DC, so the loop itself must stay below 1 for tails to die.
pub const MAX_LOOP_GAIN: f32 = 0.99;

/// A delay line with feedback.
///
/// The buffer holds `MAX_DELAY_SECONDS` of audio; the effective delay is
/// re-read from the parameter bank at the start of every block. Echoes pass
/// through a one-pole lowpass before being fed back. `feedback` maps
/// linearly onto `0..=MAX_LOOP_GAIN`.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
    lp_state: f32,
}

impl Delay {
    pub fn new(sample_rate: f32) -> Self {
        let buffer_size = (sample_rate * MAX_DELAY_SECONDS) as usize + 1;
        Self {
            buffer: vec![0.0; buffer_size],
            write_pos: 0,
            sample_rate,
            lp_state: 0.0,
        }
    }

    /// One-pole smoothing coefficient for a cutoff in Hz
    #[inline]
    fn lowpass_coefficient(&self, cutoff: f32) -> f32 {
        let nyquist = self.sample_rate * 0.5;
        if cutoff >= nyquist {
            return 0.0;
        }
        (-2.0 * PI * cutoff / self.sample_rate).exp()
    }
}

impl Effect for Delay {
    fn kind(&self) -> EffectKind {
        EffectKind::Delay
    }

    fn process(&mut self, params: &ParamBank, block: &mut [f32]) {
        let buffer_len = self.buffer.len();
        let delay_samples = ((params.get(TIME) * self.sample_rate).round() as usize).clamp(1, buffer_len - 1);
        let feedback = params.get(FEEDBACK) * MAX_LOOP_GAIN;
        let lp = self.lowpass_coefficient(params.get(LOWPASS));
        let mix = params.get(MIX);

        for sample in block.iter_mut() {
            let read_pos = (self.write_pos + buffer_len - delay_samples) % buffer_len;
            let delayed = self.buffer[read_pos];

            self.lp_state = (1.0 - lp) * delayed + lp * self.lp_state;
            self.buffer[self.write_pos] = *sample + self.lp_state * feedback;
            self.write_pos = (self.write_pos + 1) % buffer_len;

            *sample = *sample * (1.0 - mix) + delayed * mix;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.lp_state = 0.0;
    }
}
