//! Audio Module - linear effect chain with taps
//!
//! Source -> Delay -> Filter -> Distortion -> Compressor -> Reverb -> Gain -> Output
//!
//! 制御側 (EffectChain / EffectNode) と処理側 (ChainProcessor) は
//! アトミックなセルとスナップショットだけを共有する。

mod buffer;
mod edge;
mod graph;
mod meters;
mod node;
mod params;

pub mod analyzer;
pub mod chain;
pub mod effects;
pub mod processor;
pub mod recorder;
pub mod source;
pub mod tap;

pub use analyzer::{AnalyzerConfig, SpectrumAnalyzer, SpectrumSnapshot};
pub use buffer::AudioBuffer;
pub use chain::{ActiveSource, EffectChain, Topology};
pub use edge::{Edge, EdgeId};
pub use effects::FilterType;
pub use graph::ChainGraph;
pub use meters::{ChainMeters, PortMeter};
pub use node::{Effect, EffectKind, EffectNode, NodeHandle, NodeType};
pub use params::{ParamBank, ParamCell, ParamSpec};
pub use processor::ChainProcessor;
pub use recorder::{Recorder, RecorderState, RecordingBuffer, SealedRecording};
pub use source::{CaptureFeed, FileSource, InputSource, SignalSource, SourceKind};
pub use tap::{TapPoint, TapPosition, TAP_CAPACITY};

/// Maximum frames per audio callback
pub const MAX_FRAMES: usize = 4096;

/// Default sample rate
pub const SAMPLE_RATE: u32 = 48000;
