//! fxchain - real-time audio effect chain
//!
//! A selectable source (microphone or decoded file) feeds a fixed linear
//! chain of effects. Two spectrum taps observe the stream before and after
//! the chain, and a recorder captures the processed output for export.
//!
//! [`AudioEngine`] is the control-side context; [`ChainProcessor`] is handed
//! to whatever drives the audio clock. They share nothing but atomics and
//! published snapshots.

pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;

pub use audio::{
    AnalyzerConfig, CaptureFeed, ChainMeters, ChainProcessor, EffectChain, EffectKind,
    EffectNode, FileSource, FilterType, InputSource, ParamSpec, Recorder, RecorderState,
    SealedRecording, SignalSource, SourceKind, SpectrumAnalyzer, SpectrumSnapshot, TapPoint,
    TapPosition, Topology,
};
pub use config::EngineConfig;
pub use error::{EngineError, RecorderStateError, Result};
pub use export::{ExportResult, ExportSummary, ExportWorker, WavExporter};

use arc_swap::ArcSwap;
use audio::TAP_CAPACITY;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Control-side context owning the chain, the recorder and the meters
pub struct AudioEngine {
    config: EngineConfig,
    chain: EffectChain,
    recorder: Arc<Recorder>,
    meters: Arc<ArcSwap<ChainMeters>>,
}

impl AudioEngine {
    /// Build the engine and the processor that drives it.
    ///
    /// The configuration is validated first; nothing is built on error.
    pub fn new(config: EngineConfig) -> Result<(Self, ChainProcessor)> {
        config.validate()?;

        let chain = EffectChain::new(&config.chain, TAP_CAPACITY.max(config.fft_size))?;
        for (effect, values) in &config.parameters {
            let kind: EffectKind = effect.parse()?;
            for (name, &value) in values {
                chain.set_parameter(kind, name, value)?;
            }
        }

        let recorder = Arc::new(Recorder::new(config.sample_rate));
        let meters = Arc::new(ArcSwap::from_pointee(ChainMeters::new()));
        let processor = ChainProcessor::new(
            &chain,
            Arc::clone(&recorder),
            Arc::clone(&meters),
            config.sample_rate as f32,
            config.block_size,
        );

        info!(
            "[Engine] Ready: {} Hz, {} frames/block, {} effects",
            config.sample_rate,
            config.block_size,
            config.chain.len()
        );
        Ok((
            Self {
                config,
                chain,
                recorder,
                meters,
            },
            processor,
        ))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    // --- Sources ---

    pub fn register_source(&self, source: Arc<dyn SignalSource>) {
        self.chain.register_source(source);
    }

    pub fn set_source(&self, kind: SourceKind) -> Result<()> {
        self.chain.set_source(kind)
    }

    pub fn set_source_by_name(&self, name: &str) -> Result<()> {
        self.chain.set_source_by_name(name)
    }

    pub fn active_source(&self) -> Option<SourceKind> {
        self.chain.active_source()
    }

    pub fn play(&self) -> Result<()> {
        self.chain.play()
    }

    pub fn stop(&self) {
        self.chain.stop()
    }

    pub fn is_playing(&self) -> bool {
        self.chain.is_playing()
    }

    // --- Parameters ---

    pub fn node(&self, kind: EffectKind) -> Option<&EffectNode> {
        self.chain.node(kind)
    }

    /// Set a parameter by effect kind; returns the clamped value stored
    pub fn set_parameter(&self, kind: EffectKind, name: &str, value: f32) -> Result<f32> {
        self.chain.set_parameter(kind, name, value)
    }

    pub fn set_filter_type(&self, filter_type: FilterType) -> Result<()> {
        self.chain
            .set_parameter(EffectKind::Filter, "type", filter_type.as_param())
            .map(|_| ())
    }

    // --- Analysis ---

    pub fn tap_original(&self) -> Arc<TapPoint> {
        self.chain.tap_original()
    }

    pub fn tap_processed(&self) -> Arc<TapPoint> {
        self.chain.tap_processed()
    }

    /// New analyzer on a tap, using the configured analysis settings.
    ///
    /// Analyzers are independent: each keeps its own smoothing state.
    pub fn analyzer(&self, position: TapPosition) -> Result<SpectrumAnalyzer> {
        SpectrumAnalyzer::new(self.chain.tap(position), self.config.analyzer())
    }

    /// Levels from the most recent block
    pub fn meters(&self) -> Arc<ChainMeters> {
        self.meters.load_full()
    }

    // --- Recording ---

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn start_recording(&self) -> Result<()> {
        self.recorder.start()
    }

    pub fn stop_recording(&self) -> Result<SealedRecording> {
        self.recorder.stop()
    }

    /// Write a sealed recording as WAV into `dir` under the configured name.
    ///
    /// The recording stays with the caller, so a failed write can be retried.
    pub fn export_recording(
        &self,
        recording: &SealedRecording,
        dir: impl AsRef<Path>,
    ) -> Result<ExportSummary> {
        WavExporter::new().write(recording, dir.as_ref().join(&self.config.export_file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_applies_parameter_overrides() {
        let mut config = EngineConfig::default();
        config
            .parameters
            .entry("distortion".into())
            .or_default()
            .insert("amount".into(), 5.0);
        let (engine, _processor) = AudioEngine::new(config).unwrap();
        assert_eq!(
            engine.node(EffectKind::Distortion).unwrap().parameter("amount"),
            Some(1.0)
        );
    }

    #[test]
    fn test_invalid_config_builds_nothing() {
        let config = EngineConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            AudioEngine::new(config),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_set_filter_type() {
        let (engine, _processor) = AudioEngine::new(EngineConfig::default()).unwrap();
        engine.set_filter_type(FilterType::Bandpass).unwrap();
        let value = engine.node(EffectKind::Filter).unwrap().parameter("type").unwrap();
        assert_eq!(FilterType::from_param(value), FilterType::Bandpass);
    }

    #[test]
    fn test_failed_export_keeps_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _processor) = AudioEngine::new(EngineConfig::default()).unwrap();
        engine.start_recording().unwrap();
        engine.recorder().capture(&[0.5; 32]);
        let sealed = engine.stop_recording().unwrap();

        let missing = dir.path().join("missing").join("sub");
        assert!(matches!(
            engine.export_recording(&sealed, &missing),
            Err(EngineError::Export(_))
        ));
        assert_eq!(sealed.len(), 32);

        let summary = engine.export_recording(&sealed, dir.path()).unwrap();
        assert_eq!(summary.frames, 32);
        assert_eq!(summary.recording_id, sealed.id());
    }
}
