//! Biquad filter - lowpass / highpass / bandpass, Audio EQ Cookbook coefficients.

use crate::audio::node::{Effect, EffectKind};
use crate::audio::params::{ParamBank, ParamSpec};
use std::f64::consts::PI;

const TYPE: usize = 0;
const FREQUENCY: usize = 1;
const RESONANCE: usize = 2;

pub static FILTER_PARAMS: [ParamSpec; 3] = [
    ParamSpec::stepped("type", 0.0, 2.0, 0.0),
    ParamSpec::new("frequency", 50.0, 12000.0, 5000.0),
    ParamSpec::new("resonance", 0.001, 1000.0, 1.0),
];

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

impl FilterType {
    /// Value stored in the `type` parameter
    pub fn as_param(&self) -> f32 {
        match self {
            FilterType::Lowpass => 0.0,
            FilterType::Highpass => 1.0,
            FilterType::Bandpass => 2.0,
        }
    }

    pub fn from_param(value: f32) -> Self {
        match value.round() as i32 {
            1 => FilterType::Highpass,
            2 => FilterType::Bandpass,
            _ => FilterType::Lowpass,
        }
    }
}

/// A biquad IIR filter (2nd order), Direct Form II Transposed.
///
/// Coefficients are recomputed only when a parameter differs from the last
/// block.
#[derive(Debug, Clone)]
pub struct Filter {
    sample_rate: f64,
    // Parameters the coefficients were computed for
    current: Option<(FilterType, f32, f32)>,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,
}

impl Filter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            current: None,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn update_coefficients(&mut self, filter_type: FilterType, frequency: f32, q: f32) {
        self.current = Some((filter_type, frequency, q));
        // Keep the cutoff below Nyquist for low sample rates
        let cutoff = (frequency as f64).min(self.sample_rate * 0.49);
        let w0 = 2.0 * PI * cutoff / self.sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q as f64);

        let (b0, b1, b2) = match filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = (-2.0 * cos_w0) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    fn tick(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

impl Effect for Filter {
    fn kind(&self) -> EffectKind {
        EffectKind::Filter
    }

    fn process(&mut self, params: &ParamBank, block: &mut [f32]) {
        let wanted = (
            FilterType::from_param(params.get(TYPE)),
            params.get(FREQUENCY),
            params.get(RESONANCE),
        );
        if self.current != Some(wanted) {
            self.update_coefficients(wanted.0, wanted.1, wanted.2);
        }

        for sample in block.iter_mut() {
            *sample = self.tick(*sample as f64) as f32;
        }
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;

    fn bank(filter_type: FilterType, frequency: f32, q: f32) -> ParamBank {
        let params = ParamBank::new(&FILTER_PARAMS);
        params.set(TYPE, filter_type.as_param());
        params.set(FREQUENCY, frequency);
        params.set(RESONANCE, q);
        params
    }

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SR).sin())
            .collect()
    }

    #[test]
    fn lowpass_passes_dc() {
        let params = bank(FilterType::Lowpass, 5000.0, 0.707);
        let mut f = Filter::new(SR);
        let mut block = vec![1.0f32; 1000];
        f.process(&params, &mut block);
        assert!((block[999] - 1.0).abs() < 0.001, "got {}", block[999]);
    }

    #[test]
    fn highpass_blocks_dc() {
        let params = bank(FilterType::Highpass, 1000.0, 0.707);
        let mut f = Filter::new(SR);
        let mut block = vec![1.0f32; 1000];
        f.process(&params, &mut block);
        assert!(block[999].abs() < 0.001, "got {}", block[999]);
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let params = bank(FilterType::Lowpass, 200.0, 0.707);
        let mut f = Filter::new(SR);
        let mut block = sine(10000.0, 4410);
        f.process(&params, &mut block);
        let max_out = block[1000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(max_out < 0.01, "got amplitude {max_out}");
    }

    #[test]
    fn bandpass_output_finite() {
        let params = bank(FilterType::Bandpass, 1000.0, 1.0);
        let mut f = Filter::new(SR);
        let mut block: Vec<f32> = (0..10000).map(|i| if i % 100 == 0 { 1.0 } else { 0.0 }).collect();
        f.process(&params, &mut block);
        assert!(block.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn type_switch_takes_effect_next_block() {
        let params = bank(FilterType::Lowpass, 1000.0, 0.707);
        let mut f = Filter::new(SR);
        let mut block = vec![1.0f32; 1000];
        f.process(&params, &mut block);
        assert!((block[999] - 1.0).abs() < 0.01);

        params.set(TYPE, FilterType::Highpass.as_param());
        let mut block = vec![1.0f32; 2000];
        f.process(&params, &mut block);
        assert!(block[1999].abs() < 0.01);
    }

    #[test]
    fn filter_type_param_round_trip() {
        for t in [FilterType::Lowpass, FilterType::Highpass, FilterType::Bandpass] {
            assert_eq!(FilterType::from_param(t.as_param()), t);
        }
    }
}
