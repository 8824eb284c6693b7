//! Waveshaping distortion

use crate::audio::node::{Effect, EffectKind};
use crate::audio::params::{ParamBank, ParamSpec};
use std::f32::consts::PI;

const AMOUNT: usize = 0;

/// `amount` is bounded to [0, 1]. Values above 1 are clamped like any
/// other out-of-range input.
pub static DISTORTION_PARAMS: [ParamSpec; 1] = [ParamSpec::new("amount", 0.0, 1.0, 0.1)];

/// Curve steepness at `amount = 1.0`
const MAX_K: f32 = 2000.0;

/// Stateless waveshaper.
///
/// Input is clamped to [-1, 1] (the curve's domain) and mapped through
/// `y = (3 + k) * x * 20° / (π + k * |x|)`, with `k = amount * 2000`.
#[derive(Debug, Default, Clone)]
pub struct Distortion;

impl Distortion {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    pub fn shape(x: f32, k: f32) -> f32 {
        let deg = PI / 180.0;
        let x = x.clamp(-1.0, 1.0);
        (3.0 + k) * x * 20.0 * deg / (PI + k * x.abs())
    }
}

impl Effect for Distortion {
    fn kind(&self) -> EffectKind {
        EffectKind::Distortion
    }

    fn process(&mut self, params: &ParamBank, block: &mut [f32]) {
        let k = params.get(AMOUNT) * MAX_K;
        for sample in block.iter_mut() {
            *sample = Self::shape(*sample, k);
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_is_odd_and_bounded() {
        for k in [0.0, 200.0, MAX_K] {
            for x in [-1.0f32, -0.3, 0.0, 0.3, 1.0] {
                let y = Distortion::shape(x, k);
                assert!((y + Distortion::shape(-x, k)).abs() < 1e-6);
                assert!(y.abs() <= 1.0);
            }
        }
    }

    #[test]
    fn test_more_amount_drives_harder() {
        // Quiet input gets pushed up more with a steeper curve
        let soft = Distortion::shape(0.05, 0.0);
        let hard = Distortion::shape(0.05, MAX_K);
        assert!(hard > soft);
    }

    #[test]
    fn test_input_beyond_unity_is_clamped() {
        let k = 500.0;
        assert_eq!(Distortion::shape(4.0, k), Distortion::shape(1.0, k));
    }

    #[test]
    fn test_process_uses_amount() {
        let params = ParamBank::new(&DISTORTION_PARAMS);
        params.set(AMOUNT, 3.0); // clamped to 1.0
        let mut d = Distortion::new();
        let mut block = [0.5f32];
        d.process(&params, &mut block);
        assert!((block[0] - Distortion::shape(0.5, MAX_K)).abs() < 1e-6);
    }
}
