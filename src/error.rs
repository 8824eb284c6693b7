//! Engine error types

use thiserror::Error;

/// Recorder state-machine violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecorderStateError {
    #[error("already recording")]
    AlreadyRecording,
    #[error("not recording")]
    NotRecording,
}

/// Errors surfaced to the control layer.
///
/// Every variant leaves the engine in its previous state: no partial graph,
/// no partial recording.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown source kind, unknown node/parameter, or invalid structural setup
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Recorder start/stop called out of sequence
    #[error("state error: {0}")]
    State(#[from] RecorderStateError),

    /// Source activation failed (device unavailable, permission denied)
    #[error("device error: {0}")]
    Device(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("export error: {0}")]
    Export(#[from] hound::Error),
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
