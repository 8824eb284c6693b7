//! Engine Configuration
//! Handles saving and loading of engine settings and parameter presets

use crate::audio::{AnalyzerConfig, EffectKind, MAX_FRAMES, SAMPLE_RATE};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Block size default
const DEFAULT_BLOCK_SIZE: usize = 256;

/// Get config directory path
fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fxchain"))
}

/// Get config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|p| p.join("config.json"))
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Config version (for future migrations)
    pub version: u32,
    pub sample_rate: u32,
    /// Frames per processing block
    pub block_size: usize,
    /// Analyzer FFT size (bin count is half)
    pub fft_size: usize,
    /// Analyzer smoothing time constant
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Effect order, source to output
    pub chain: Vec<EffectKind>,
    /// Initial parameter values: effect name -> parameter name -> value
    pub parameters: BTreeMap<String, BTreeMap<String, f32>>,
    /// Default file name for exported recordings
    pub export_file_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let analyzer = AnalyzerConfig::default();
        Self {
            version: 1,
            sample_rate: SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            fft_size: analyzer.fft_size,
            smoothing: analyzer.smoothing,
            min_decibels: analyzer.min_decibels,
            max_decibels: analyzer.max_decibels,
            chain: EffectKind::CHAIN.to_vec(),
            parameters: BTreeMap::new(),
            export_file_name: "processedAudio.wav".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn analyzer(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: self.fft_size,
            smoothing: self.smoothing,
            min_decibels: self.min_decibels,
            max_decibels: self.max_decibels,
        }
    }

    /// Check every structural setting.
    ///
    /// Parameter values themselves are not checked: they are clamped when
    /// applied.
    pub fn validate(&self) -> Result<()> {
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(EngineError::config(format!(
                "sample_rate must be in 8000..=192000, got {}",
                self.sample_rate
            )));
        }
        if !(1..=MAX_FRAMES).contains(&self.block_size) {
            return Err(EngineError::config(format!(
                "block_size must be in 1..={}, got {}",
                MAX_FRAMES, self.block_size
            )));
        }
        self.analyzer().validate()?;

        if self.chain.is_empty() {
            return Err(EngineError::config("chain must contain at least one effect"));
        }
        for (i, kind) in self.chain.iter().enumerate() {
            if self.chain[..i].contains(kind) {
                return Err(EngineError::config(format!("effect '{}' listed twice", kind)));
            }
        }

        for (effect, values) in &self.parameters {
            let kind: EffectKind = effect.parse()?;
            if !self.chain.contains(&kind) {
                return Err(EngineError::config(format!(
                    "parameters given for '{}' which is not in the chain",
                    kind
                )));
            }
            let specs = kind.param_specs();
            for name in values.keys() {
                if !specs.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
                    return Err(EngineError::config(format!(
                        "{} has no parameter '{}'",
                        kind, name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from the user config directory, falling back to defaults
    pub fn load_or_default() -> Self {
        let path = match get_config_path() {
            Some(p) => p,
            None => {
                info!("[Config] Could not determine config path, using defaults");
                return Self::default();
            }
        };

        if !path.exists() {
            info!("[Config] No config file found, using defaults");
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("[Config] Failed to load config: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;

        info!("[Config] Saved configuration to {:?}", path);
        Ok(())
    }

    /// Save to the user config directory
    pub fn save_default(&self) -> Result<()> {
        let path = get_config_path()
            .ok_or_else(|| EngineError::config("could not determine config directory"))?;
        self.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chain, EffectKind::CHAIN.to_vec());
        assert_eq!(config.analyzer().bin_count(), 1024);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = EngineConfig::default();
        config.block_size = 128;
        config
            .parameters
            .entry("reverb".into())
            .or_default()
            .insert("time".into(), 4.0);
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "block_size": 512 }"#).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.block_size, 512);
        assert_eq!(loaded.sample_rate, SAMPLE_RATE);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases: Vec<EngineConfig> = vec![
            EngineConfig { sample_rate: 100, ..Default::default() },
            EngineConfig { block_size: 0, ..Default::default() },
            EngineConfig { block_size: MAX_FRAMES + 1, ..Default::default() },
            EngineConfig { fft_size: 1000, ..Default::default() },
            EngineConfig { smoothing: 1.5, ..Default::default() },
            EngineConfig { min_decibels: 0.0, max_decibels: -10.0, ..Default::default() },
            EngineConfig { chain: vec![], ..Default::default() },
            EngineConfig {
                chain: vec![EffectKind::Gain, EffectKind::Gain],
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(EngineError::Configuration(_))),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_unknown_parameter_override_rejected() {
        let mut config = EngineConfig::default();
        config
            .parameters
            .entry("filter".into())
            .or_default()
            .insert("cutoff".into(), 1000.0);
        assert!(config.validate().is_err());

        let mut config = EngineConfig {
            chain: vec![EffectKind::Gain],
            ..Default::default()
        };
        config
            .parameters
            .entry("reverb".into())
            .or_default()
            .insert("mix".into(), 0.2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(EngineError::Serialization(_))
        ));
    }
}
