//! Compressor effect - feed-forward dynamics with soft knee.

use crate::audio::node::{Effect, EffectKind};
use crate::audio::params::{ParamBank, ParamSpec};

const THRESHOLD: usize = 0;
const RATIO: usize = 1;
const KNEE: usize = 2;
const ATTACK: usize = 3;
const RELEASE: usize = 4;

pub static COMPRESSOR_PARAMS: [ParamSpec; 5] = [
    ParamSpec::new("threshold", -100.0, 0.0, -24.0),
    ParamSpec::new("ratio", 1.0, 20.0, 12.0),
    ParamSpec::new("knee", 0.0, 40.0, 30.0),
    ParamSpec::new("attack", 0.0, 1.0, 0.003),
    ParamSpec::new("release", 0.0, 1.0, 0.25),
];

/// Peak envelope follower driving a static gain curve.
#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f64,
    envelope: f64,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            envelope: 0.0,
        }
    }

    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Smoothing coefficient for a time constant; zero time means instant.
    #[inline]
    fn coefficient(&self, seconds: f64) -> f64 {
        if seconds <= 0.0 {
            0.0
        } else {
            (-1.0 / (seconds * self.sample_rate)).exp()
        }
    }

    /// Gain change in dB (<= 0) for an input level in dB
    pub fn gain_reduction(input_db: f64, threshold: f64, ratio: f64, knee: f64) -> f64 {
        let slope = 1.0 - 1.0 / ratio;
        if knee <= 0.0 {
            if input_db <= threshold {
                0.0
            } else {
                (threshold - input_db) * slope
            }
        } else {
            let half_knee = knee / 2.0;
            let knee_start = threshold - half_knee;
            let knee_end = threshold + half_knee;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold - input_db) * slope
            } else {
                let x = input_db - knee_start;
                -slope * x * x / (2.0 * knee)
            }
        }
    }

    /// Current envelope in dB (metering)
    pub fn envelope_db(&self) -> f64 {
        Self::linear_to_db(self.envelope)
    }
}

impl Effect for Compressor {
    fn kind(&self) -> EffectKind {
        EffectKind::Compressor
    }

    fn process(&mut self, params: &ParamBank, block: &mut [f32]) {
        let threshold = params.get(THRESHOLD) as f64;
        let ratio = params.get(RATIO) as f64;
        let knee = params.get(KNEE) as f64;
        let attack_coef = self.coefficient(params.get(ATTACK) as f64);
        let release_coef = self.coefficient(params.get(RELEASE) as f64);

        for sample in block.iter_mut() {
            let level = sample.abs() as f64;
            let coef = if level > self.envelope { attack_coef } else { release_coef };
            self.envelope = coef * self.envelope + (1.0 - coef) * level;

            let reduction = Self::gain_reduction(Self::linear_to_db(self.envelope), threshold, ratio, knee);
            *sample *= Self::db_to_linear(reduction) as f32;
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(threshold: f32, ratio: f32, knee: f32, attack: f32, release: f32) -> ParamBank {
        let params = ParamBank::new(&COMPRESSOR_PARAMS);
        params.set(THRESHOLD, threshold);
        params.set(RATIO, ratio);
        params.set(KNEE, knee);
        params.set(ATTACK, attack);
        params.set(RELEASE, release);
        params
    }

    #[test]
    fn test_passthrough_below_threshold() {
        let params = bank(-20.0, 4.0, 0.0, 0.001, 0.1);
        let mut comp = Compressor::new(44100.0);
        let mut block = vec![0.05f32; 1000]; // about -26 dB
        comp.process(&params, &mut block);
        assert!((block[999] - 0.05).abs() < 1e-4, "got {}", block[999]);
    }

    #[test]
    fn test_reduces_loud_signals() {
        let params = bank(-12.0, 4.0, 0.0, 0.001, 0.1);
        let mut comp = Compressor::new(44100.0);
        let mut block = vec![1.0f32; 4096];
        comp.process(&params, &mut block);
        // 12 dB over at 4:1 -> -9 dB
        let out = block[4095];
        assert!(out < 0.5 && out > 0.3, "got {out}");
    }

    #[test]
    fn test_attack_ramps_in() {
        let params = bank(-20.0, 10.0, 0.0, 0.01, 0.5);
        let mut comp = Compressor::new(44100.0);
        let mut block = vec![1.0f32; 600];
        comp.process(&params, &mut block);
        assert!(block[0] > block[599]);
    }

    #[test]
    fn test_release_recovers_gain() {
        let params = bank(-20.0, 10.0, 0.0, 0.001, 0.05);
        let mut comp = Compressor::new(44100.0);
        let mut loud = vec![1.0f32; 1000];
        comp.process(&params, &mut loud);

        let mut quiet = vec![0.1f32; 6000];
        comp.process(&params, &mut quiet);
        assert!(quiet[5999] > quiet[0]);
    }

    #[test]
    fn test_soft_knee_is_continuous() {
        let (t, r, k) = (-24.0, 12.0, 30.0);
        let below = Compressor::gain_reduction(t - k / 2.0 - 1e-9, t, r, k);
        let at_start = Compressor::gain_reduction(t - k / 2.0 + 1e-9, t, r, k);
        assert!((below - at_start).abs() < 1e-6);

        let inside = Compressor::gain_reduction(t + k / 2.0 - 1e-9, t, r, k);
        let above = Compressor::gain_reduction(t + k / 2.0 + 1e-9, t, r, k);
        assert!((inside - above).abs() < 1e-6);
    }

    #[test]
    fn test_zero_attack_is_instant() {
        let params = bank(-20.0, 20.0, 0.0, 0.0, 0.25);
        let mut comp = Compressor::new(44100.0);
        let mut block = [1.0f32];
        comp.process(&params, &mut block);
        assert!(block[0] < 0.2);
        assert!((comp.envelope_db()).abs() < 1e-6);
    }
}
