//! Node identifiers, effect kinds and the Effect trait

use super::params::{ParamBank, ParamSpec};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Node の一意識別子
///
/// 不透明なID。ノードの種類はグラフ側が持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<NodeHandle> for u32 {
    fn from(handle: NodeHandle) -> Self {
        handle.0
    }
}

/// エフェクトの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Delay,
    Filter,
    Distortion,
    Compressor,
    Reverb,
    Gain,
}

impl EffectKind {
    /// Default chain order, source to output
    pub const CHAIN: [EffectKind; 6] = [
        EffectKind::Delay,
        EffectKind::Filter,
        EffectKind::Distortion,
        EffectKind::Compressor,
        EffectKind::Reverb,
        EffectKind::Gain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Delay => "delay",
            EffectKind::Filter => "filter",
            EffectKind::Distortion => "distortion",
            EffectKind::Compressor => "compressor",
            EffectKind::Reverb => "reverb",
            EffectKind::Gain => "gain",
        }
    }

    /// Parameter table for this kind
    pub fn param_specs(&self) -> &'static [ParamSpec] {
        use super::effects::*;
        match self {
            EffectKind::Delay => &DELAY_PARAMS,
            EffectKind::Filter => &FILTER_PARAMS,
            EffectKind::Distortion => &DISTORTION_PARAMS,
            EffectKind::Compressor => &COMPRESSOR_PARAMS,
            EffectKind::Reverb => &REVERB_PARAMS,
            EffectKind::Gain => &GAIN_PARAMS,
        }
    }

    /// Build the DSP state for this kind
    pub(crate) fn build(&self, sample_rate: f32) -> Box<dyn Effect> {
        use super::effects::*;
        match self {
            EffectKind::Delay => Box::new(Delay::new(sample_rate)),
            EffectKind::Filter => Box::new(Filter::new(sample_rate)),
            EffectKind::Distortion => Box::new(Distortion::new()),
            EffectKind::Compressor => Box::new(Compressor::new(sample_rate)),
            EffectKind::Reverb => Box::new(Reverb::new(sample_rate)),
            EffectKind::Gain => Box::new(Gain::new()),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        EffectKind::CHAIN
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::config(format!("unknown effect '{}'", s)))
    }
}

/// ノードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Chain head: whichever source is currently bound
    Source,
    Effect(EffectKind),
    /// Chain tail: speaker output
    Output,
}

/// エフェクト処理のインターフェース
///
/// Runs on the audio thread. `process` transforms one block in place and
/// must not allocate or block.
pub trait Effect: Send {
    fn kind(&self) -> EffectKind;

    /// Process a block in place, reading parameters from `params`
    fn process(&mut self, params: &ParamBank, block: &mut [f32]);

    /// Clear internal DSP state (delay lines, tails, envelopes)
    fn reset(&mut self);
}

/// Control-side handle to one effect node.
///
/// Cheap to clone; all clones share the same parameter cells as the audio
/// path.
#[derive(Debug, Clone)]
pub struct EffectNode {
    handle: NodeHandle,
    kind: EffectKind,
    params: Arc<ParamBank>,
}

impl EffectNode {
    pub(crate) fn new(handle: NodeHandle, kind: EffectKind) -> Self {
        Self {
            handle,
            kind,
            params: Arc::new(ParamBank::new(kind.param_specs())),
        }
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub(crate) fn bank(&self) -> Arc<ParamBank> {
        Arc::clone(&self.params)
    }

    /// Set a parameter, clamping to its documented range.
    ///
    /// Returns the value actually stored. Only an unknown name is an error.
    pub fn set_parameter(&self, name: &str, value: f32) -> Result<f32> {
        let index = self.params.index_of(name).ok_or_else(|| {
            EngineError::config(format!("{} has no parameter '{}'", self.kind, name))
        })?;
        let stored = self.params.set(index, value).unwrap_or(value);
        debug!("[Node] {}.{} = {} (requested {})", self.kind, name, stored, value);
        Ok(stored)
    }

    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.params.value(name)
    }

    pub fn parameters(&self) -> Vec<(&'static str, f32)> {
        self.params.values()
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        self.params.specs()
    }
}
