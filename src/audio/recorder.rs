//! Recorder - captures the processed tap into an exportable buffer
//!
//! State machine: `Idle -> Recording -> Idle`.
//!
//! The audio thread appends whole blocks and never waits: it only
//! `try_lock`s the active buffer, and the only contenders are `start`/`stop`
//! themselves. A block that races a transition belongs to the idle side of
//! it. Control calls are serialized by a separate lock, so a rejected
//! `start` never touches the buffer that is still accumulating.

use crate::error::{RecorderStateError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// 録音中のバッファ（追記のみ）
#[derive(Debug)]
pub struct RecordingBuffer {
    id: Uuid,
    sample_rate: u32,
    samples: Vec<f32>,
    blocks: usize,
}

impl RecordingBuffer {
    fn new(sample_rate: u32, reserve: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            sample_rate,
            samples: Vec::with_capacity(reserve),
            blocks: 0,
        }
    }

    fn append(&mut self, block: &[f32]) {
        self.samples.extend_from_slice(block);
        self.blocks += 1;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn seal(self) -> SealedRecording {
        SealedRecording {
            id: self.id,
            sample_rate: self.sample_rate,
            samples: self.samples,
            blocks: self.blocks,
        }
    }
}

/// Finished recording, handed to the export sink. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedRecording {
    id: Uuid,
    sample_rate: u32,
    samples: Vec<f32>,
    blocks: usize,
}

impl SealedRecording {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of processing blocks captured
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// 録音状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

pub struct Recorder {
    sample_rate: u32,
    /// Frames to pre-allocate per recording
    reserve: usize,
    recording: AtomicBool,
    /// Mirrors the active buffer length so readers never touch its lock
    frames: AtomicUsize,
    active: Mutex<Option<RecordingBuffer>>,
    control: Mutex<()>,
}

impl Recorder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            // ten seconds up front keeps early appends allocation-free
            reserve: sample_rate as usize * 10,
            recording: AtomicBool::new(false),
            frames: AtomicUsize::new(0),
            active: Mutex::new(None),
            control: Mutex::new(()),
        }
    }

    pub fn state(&self) -> RecorderState {
        if self.recording.load(Ordering::Acquire) {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Idle -> Recording
    pub fn start(&self) -> Result<()> {
        let _control = self.control.lock();
        if self.recording.load(Ordering::Acquire) {
            return Err(RecorderStateError::AlreadyRecording.into());
        }

        let buffer = RecordingBuffer::new(self.sample_rate, self.reserve);
        info!("[Recorder] Start recording {}", buffer.id);
        *self.active.lock() = Some(buffer);
        self.frames.store(0, Ordering::Release);
        self.recording.store(true, Ordering::Release);
        Ok(())
    }

    /// Recording -> Idle; returns the sealed buffer
    pub fn stop(&self) -> Result<SealedRecording> {
        let _control = self.control.lock();
        if !self.recording.load(Ordering::Acquire) {
            return Err(RecorderStateError::NotRecording.into());
        }

        self.recording.store(false, Ordering::Release);
        let buffer = self
            .active
            .lock()
            .take()
            .ok_or(RecorderStateError::NotRecording)?;
        let sealed = buffer.seal();
        info!(
            "[Recorder] Stopped recording {}: {} frames ({:.3}s)",
            sealed.id,
            sealed.len(),
            sealed.duration().as_secs_f64()
        );
        Ok(sealed)
    }

    /// Frames captured so far in the active recording
    pub fn recorded_frames(&self) -> usize {
        if self.is_recording() {
            self.frames.load(Ordering::Acquire)
        } else {
            0
        }
    }

    /// Append one processed block (audio thread)
    pub(crate) fn capture(&self, block: &[f32]) {
        if !self.recording.load(Ordering::Acquire) {
            return;
        }
        match self.active.try_lock() {
            Some(mut guard) => {
                if let Some(buffer) = guard.as_mut() {
                    buffer.append(block);
                    self.frames.store(buffer.len(), Ordering::Release);
                }
            }
            None => debug!("[Recorder] Block skipped during transition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_start_stop_round_trip() {
        let rec = Recorder::new(1000);
        rec.start().unwrap();
        rec.capture(&[0.1; 100]);
        rec.capture(&[0.2; 100]);
        let sealed = rec.stop().unwrap();

        assert_eq!(sealed.len(), 200);
        assert_eq!(sealed.blocks(), 2);
        assert!((sealed.duration().as_secs_f64() - 0.2).abs() < 1e-9);
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[test]
    fn test_stop_when_idle_is_state_error() {
        let rec = Recorder::new(1000);
        let err = rec.stop().unwrap_err();
        assert!(matches!(err, EngineError::State(RecorderStateError::NotRecording)));
        assert_eq!(rec.recorded_frames(), 0);
    }

    #[test]
    fn test_start_twice_keeps_original_buffer() {
        let rec = Recorder::new(1000);
        rec.start().unwrap();
        rec.capture(&[1.0; 10]);
        assert_eq!(rec.recorded_frames(), 10);

        let err = rec.start().unwrap_err();
        assert!(matches!(err, EngineError::State(RecorderStateError::AlreadyRecording)));

        rec.capture(&[1.0; 10]);
        let sealed = rec.stop().unwrap();
        assert_eq!(sealed.len(), 20);
    }

    #[test]
    fn test_capture_ignored_while_idle() {
        let rec = Recorder::new(1000);
        rec.capture(&[1.0; 10]);
        rec.start().unwrap();
        let sealed = rec.stop().unwrap();
        assert!(sealed.is_empty());
    }

    #[test]
    fn test_each_recording_gets_fresh_buffer() {
        let rec = Recorder::new(1000);
        rec.start().unwrap();
        rec.capture(&[1.0; 4]);
        let first = rec.stop().unwrap();

        rec.start().unwrap();
        rec.capture(&[2.0; 2]);
        let second = rec.stop().unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(second.samples(), &[2.0, 2.0]);
    }
}
