//! Spectrum analyzer
//!
//! Reads the most recent window from a [`TapPoint`] and produces byte
//! magnitude bins:
//!
//! 1. Blackman window over the last `fft_size` frames
//! 2. Forward FFT, magnitudes scaled by `1 / fft_size`
//! 3. Temporal smoothing `X = s * X_prev + (1 - s) * |X|`
//! 4. dB, then `[min_decibels, max_decibels]` mapped linearly onto 0..=255
//!
//! Each analyzer owns its window, scratch and smoothing state, so several can
//! read the same or different taps without interfering. Reading a tap never
//! blocks the audio thread.

use super::tap::TapPoint;
use crate::error::{EngineError, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// Analyzer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    /// FFT size (power of 2); bin count is half of it
    pub fft_size: usize,
    /// Temporal smoothing (0.0 - 1.0)
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(EngineError::config(format!(
                "fft_size must be a power of two in 32..=32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(EngineError::config(format!(
                "smoothing must be in 0..=1, got {}",
                self.smoothing
            )));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(EngineError::config(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        Ok(())
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// One analysis tick. Valid until the next `analyze()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumSnapshot {
    /// Monotonic per-analyzer tick counter
    pub tick: u64,
    /// Frames the tap had received when the snapshot was taken
    pub frames_seen: u64,
    pub bins: Vec<u8>,
}

impl SpectrumSnapshot {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Index of the loudest bin (lowest index on ties)
    pub fn peak_bin(&self) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        for (i, &v) in self.bins.iter().enumerate() {
            if v > best.map_or(0, |(_, b)| b) {
                best = Some((i, v));
            }
        }
        best.map(|(i, _)| i)
    }
}

pub struct SpectrumAnalyzer {
    tap: Arc<TapPoint>,
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    time_domain: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    tick: u64,
}

impl SpectrumAnalyzer {
    pub fn new(tap: Arc<TapPoint>, config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        if config.fft_size > tap.capacity() {
            return Err(EngineError::config(format!(
                "fft_size {} exceeds tap capacity {}",
                config.fft_size,
                tap.capacity()
            )));
        }

        let n = config.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(n);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        debug!(
            "[Analyzer] Attached to {:?} tap: fft_size={}, smoothing={}",
            tap.position(),
            n,
            config.smoothing
        );

        Ok(Self {
            tap,
            config,
            fft,
            window: blackman(n),
            time_domain: vec![0.0; n],
            fft_buffer: vec![Complex::new(0.0, 0.0); n],
            scratch,
            smoothed: vec![0.0; config.bin_count()],
            tick: 0,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn tap(&self) -> &Arc<TapPoint> {
        &self.tap
    }

    pub fn bin_count(&self) -> usize {
        self.config.bin_count()
    }

    /// Centre frequency of a bin in Hz
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.config.fft_size as f32
    }

    /// Analyse the current window of the tap
    pub fn analyze(&mut self) -> SpectrumSnapshot {
        let frames_seen = self.tap.read_latest(&mut self.time_domain);

        for ((dst, &x), &w) in self
            .fft_buffer
            .iter_mut()
            .zip(&self.time_domain)
            .zip(&self.window)
        {
            *dst = Complex::new(x * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch);

        let scale = 1.0 / self.config.fft_size as f32;
        let s = self.config.smoothing;
        let range = self.config.max_decibels - self.config.min_decibels;

        let mut bins = Vec::with_capacity(self.smoothed.len());
        for (prev, c) in self.smoothed.iter_mut().zip(&self.fft_buffer) {
            let magnitude = c.norm() * scale;
            let value = s * *prev + (1.0 - s) * magnitude;
            // keep NaN/inf out of the smoothing state
            *prev = if value.is_finite() { value } else { 0.0 };

            let db = if *prev > 0.0 {
                20.0 * prev.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - self.config.min_decibels) / range;
            bins.push(scaled.clamp(0.0, 255.0) as u8);
        }

        self.tick += 1;
        SpectrumSnapshot {
            tick: self.tick,
            frames_seen,
            bins,
        }
    }

    /// Current time-domain window, -1.0..=1.0 as produced
    pub fn waveform(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.config.fft_size];
        self.tap.read_latest(&mut out);
        out
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

fn blackman(n: usize) -> Vec<f32> {
    let a = 0.16;
    let a0 = 0.5 * (1.0 - a);
    let a1 = 0.5;
    let a2 = 0.5 * a;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tap::TapPosition;

    fn tap_with_sine(freq: f32, sample_rate: f32, len: usize) -> Arc<TapPoint> {
        let tap = Arc::new(TapPoint::new(TapPosition::Processed, 4096));
        let samples: Vec<f32> = (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect();
        tap.write(&samples);
        tap
    }

    // Wide range so the main lobe of a full-scale sine does not saturate
    fn config(smoothing: f32) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: 1024,
            smoothing,
            min_decibels: -100.0,
            max_decibels: 0.0,
        }
    }

    #[test]
    fn test_silence_is_all_zero() {
        let tap = Arc::new(TapPoint::new(TapPosition::Original, 4096));
        let mut analyzer = SpectrumAnalyzer::new(tap, config(0.0)).unwrap();
        let snap = analyzer.analyze();
        assert_eq!(snap.len(), 512);
        assert!(snap.bins.iter().all(|&b| b == 0));
        assert_eq!(snap.peak_bin(), None);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        // 1024-point FFT at 48 kHz: bin width 46.875 Hz, bin 64 = 3000 Hz
        let tap = tap_with_sine(3000.0, 48000.0, 4096);
        let mut analyzer = SpectrumAnalyzer::new(tap, config(0.0)).unwrap();
        let snap = analyzer.analyze();
        assert_eq!(snap.peak_bin(), Some(64));
        assert!((analyzer.bin_frequency(64, 48000) - 3000.0).abs() < 1e-3);
    }

    #[test]
    fn test_smoothing_lags_behind_input() {
        let tap = tap_with_sine(3000.0, 48000.0, 4096);
        let mut instant = SpectrumAnalyzer::new(Arc::clone(&tap), config(0.0)).unwrap();
        let mut smooth = SpectrumAnalyzer::new(tap, config(0.9)).unwrap();

        let a = instant.analyze();
        let b = smooth.analyze();
        assert!(b.bins[64] < a.bins[64]);

        // smoothing state belongs to each analyzer; repeated ticks converge
        for _ in 0..100 {
            smooth.analyze();
        }
        let c = smooth.analyze();
        assert!(c.bins[64].abs_diff(a.bins[64]) <= 1);
    }

    #[test]
    fn test_ticks_increase() {
        let tap = Arc::new(TapPoint::new(TapPosition::Original, 4096));
        let mut analyzer = SpectrumAnalyzer::new(tap, config(0.8)).unwrap();
        assert_eq!(analyzer.analyze().tick, 1);
        assert_eq!(analyzer.analyze().tick, 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let tap = Arc::new(TapPoint::new(TapPosition::Original, 4096));
        let bad_size = AnalyzerConfig { fft_size: 1000, ..Default::default() };
        assert!(SpectrumAnalyzer::new(Arc::clone(&tap), bad_size).is_err());

        let bad_range = AnalyzerConfig {
            min_decibels: -30.0,
            max_decibels: -100.0,
            ..Default::default()
        };
        assert!(SpectrumAnalyzer::new(Arc::clone(&tap), bad_range).is_err());

        let too_big = AnalyzerConfig { fft_size: 8192, ..Default::default() };
        assert!(SpectrumAnalyzer::new(tap, too_big).is_err());
    }

    #[test]
    fn test_waveform_is_latest_window() {
        let tap = Arc::new(TapPoint::new(TapPosition::Original, 4096));
        tap.write(&[0.5; 64]);
        let analyzer = SpectrumAnalyzer::new(tap, config(0.0)).unwrap();
        let wave = analyzer.waveform();
        assert_eq!(wave.len(), 1024);
        assert_eq!(wave[1023], 0.5);
        assert_eq!(wave[0], 0.0);
    }
}
