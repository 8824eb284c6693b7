//! Signal sources - interchangeable producers feeding the chain head
//!
//! A source is shared between the control thread (start/stop) and the audio
//! thread (read), so every implementation is `Send + Sync` and keeps its
//! mutable state in atomics or behind a non-blocking lock.

use crate::error::{EngineError, Result};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// ソースの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Live microphone capture
    Mic,
    /// Pre-loaded, decoded file
    File,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Mic => "Mic",
            SourceKind::File => "File",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mic" | "microphone" => Ok(SourceKind::Mic),
            "file" => Ok(SourceKind::File),
            other => Err(EngineError::config(format!("unknown source kind '{}'", other))),
        }
    }
}

/// 入力ソースの統一インターフェース
pub trait SignalSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Begin producing audio
    fn start(&self) -> Result<()>;

    /// Stop producing; `is_active` turns false
    fn stop(&self);

    fn is_active(&self) -> bool;

    /// Fill `out` with the next frames (audio thread).
    ///
    /// Returns how many frames were real audio; the rest are zero-filled.
    /// Does not re-check `is_active`: the caller decides once per block, so
    /// a stop that lands mid-block takes effect from the next one.
    fn read(&self, out: &mut [f32]) -> usize;
}

// =============================================================================
// File playback
// =============================================================================

/// Playback of an already-decoded mono buffer
///
/// `read` owns the playhead. `start` raises a restart flag that the
/// next `read` consumes, so a restart racing a read is never overwritten.
pub struct FileSource {
    samples: Arc<[f32]>,
    position: AtomicUsize,
    playing: AtomicBool,
    restart: AtomicBool,
    looping: bool,
}

impl FileSource {
    pub fn new(samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            samples: samples.into(),
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            restart: AtomicBool::new(false),
            looping: false,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Current playhead (frames)
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }
}

impl SignalSource for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    /// Play from the start
    fn start(&self) -> Result<()> {
        self.restart.store(true, Ordering::Release);
        self.position.store(0, Ordering::Release);
        self.playing.store(true, Ordering::Release);
        debug!("[FileSource] Playing {} frames", self.samples.len());
        Ok(())
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::Release);
    }

    /// Playing and not past the end
    fn is_active(&self) -> bool {
        self.playing.load(Ordering::Acquire)
            && !self.samples.is_empty()
            && (self.looping
                || self.restart.load(Ordering::Acquire)
                || self.position.load(Ordering::Acquire) < self.samples.len())
    }

    fn read(&self, out: &mut [f32]) -> usize {
        if self.samples.is_empty() {
            out.fill(0.0);
            return 0;
        }

        let total = self.samples.len();
        let mut pos = if self.restart.swap(false, Ordering::AcqRel) {
            0
        } else {
            self.position.load(Ordering::Acquire)
        };
        let mut produced = 0;
        while produced < out.len() {
            if pos >= total {
                if self.looping {
                    pos = 0;
                } else {
                    break;
                }
            }
            let n = (out.len() - produced).min(total - pos);
            out[produced..produced + n].copy_from_slice(&self.samples[pos..pos + n]);
            produced += n;
            pos += n;
        }
        out[produced..].fill(0.0);
        self.position.store(pos, Ordering::Release);
        produced
    }
}

// =============================================================================
// Live capture
// =============================================================================

/// Device status shared between the feed and the source
#[derive(Debug, Default)]
struct DeviceStatus {
    failure: Mutex<Option<String>>,
}

impl DeviceStatus {
    fn fail(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(reason.into());
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

/// Live capture source (microphone).
///
/// Samples arrive through a lock-free SPSC queue filled by the capture
/// collaborator via [`CaptureFeed`].
pub struct InputSource {
    consumer: Mutex<HeapCons<f32>>,
    active: AtomicBool,
    status: Arc<DeviceStatus>,
}

/// Producer half handed to whatever owns the capture device
pub struct CaptureFeed {
    producer: HeapProd<f32>,
    status: Arc<DeviceStatus>,
}

impl InputSource {
    /// Create a source with room for `capacity` queued frames
    pub fn new(capacity: usize) -> (Self, CaptureFeed) {
        let (producer, consumer) = HeapRb::<f32>::new(capacity.max(1)).split();
        let status = Arc::new(DeviceStatus::default());
        (
            Self {
                consumer: Mutex::new(consumer),
                active: AtomicBool::new(false),
                status: Arc::clone(&status),
            },
            CaptureFeed { producer, status },
        )
    }

    /// Frames waiting to be read
    pub fn queued(&self) -> usize {
        self.consumer.lock().occupied_len()
    }
}

impl SignalSource for InputSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Mic
    }

    fn start(&self) -> Result<()> {
        if let Some(reason) = self.status.failure() {
            warn!("[InputSource] Activation failed: {}", reason);
            self.active.store(false, Ordering::Release);
            return Err(EngineError::device(reason));
        }
        // Stale backlog would replay old audio
        let dropped = self.consumer.lock().clear();
        if dropped > 0 {
            debug!("[InputSource] Dropped {} stale frames", dropped);
        }
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn read(&self, out: &mut [f32]) -> usize {
        // The control thread only holds this briefly in start(); an underrun
        // is better than waiting.
        let Some(mut consumer) = self.consumer.try_lock() else {
            out.fill(0.0);
            return 0;
        };
        let n = consumer.pop_slice(out);
        out[n..].fill(0.0);
        n
    }
}

impl CaptureFeed {
    /// Push captured frames; returns how many fit
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Report the device as unavailable (permission denied, unplugged)
    pub fn fail(&self, reason: impl Into<String>) {
        self.status.fail(reason);
    }
}

impl Drop for CaptureFeed {
    fn drop(&mut self) {
        if self.status.failure().is_none() {
            self.status.fail("capture device disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("Mic".parse::<SourceKind>().unwrap(), SourceKind::Mic);
        assert_eq!("file".parse::<SourceKind>().unwrap(), SourceKind::File);
        let err = "Line-In".parse::<SourceKind>().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_file_source_inactive_until_started() {
        let src = FileSource::new(vec![1.0f32; 8]);
        assert!(!src.is_active());
        src.start().unwrap();
        assert!(src.is_active());

        let empty = FileSource::new(Vec::<f32>::new());
        empty.start().unwrap();
        assert!(!empty.is_active());
        let mut out = [9.0f32; 4];
        assert_eq!(empty.read(&mut out), 0);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_file_source_plays_then_ends() {
        let src = FileSource::new(vec![1.0, 2.0, 3.0]);
        src.start().unwrap();

        let mut out = [0.0f32; 2];
        assert_eq!(src.read(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);

        assert_eq!(src.read(&mut out), 1);
        assert_eq!(out, [3.0, 0.0]);
        assert!(!src.is_active());
    }

    #[test]
    fn test_file_source_loops() {
        let src = FileSource::new(vec![1.0, 2.0, 3.0]).looping(true);
        src.start().unwrap();
        let mut out = [0.0f32; 7];
        assert_eq!(src.read(&mut out), 7);
        assert_eq!(out, [1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_file_source_stop_deactivates() {
        let src = FileSource::new(vec![0.5f32; 64]);
        src.start().unwrap();
        src.stop();
        assert!(!src.is_active());
    }

    #[test]
    fn test_restart_survives_stale_playhead_store() {
        let src = FileSource::new(vec![1.0, 2.0, 3.0, 4.0]);
        src.start().unwrap();
        let mut out = [0.0f32; 2];
        src.read(&mut out);

        // A read that loaded the playhead before start() writes it back late
        src.start().unwrap();
        src.position.store(2, Ordering::Release);

        src.read(&mut out);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(src.position(), 2);
    }

    #[test]
    fn test_restart_after_end() {
        let src = FileSource::new(vec![1.0, 2.0]);
        src.start().unwrap();
        let mut out = [0.0f32; 4];
        src.read(&mut out);
        assert!(!src.is_active());

        src.start().unwrap();
        assert!(src.is_active());
        assert_eq!(src.read(&mut out), 2);
        assert_eq!(out, [1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_input_source_reads_feed() {
        let (src, mut feed) = InputSource::new(16);
        src.start().unwrap();
        assert_eq!(feed.push(&[0.1, 0.2, 0.3]), 3);

        let mut out = [9.0f32; 4];
        assert_eq!(src.read(&mut out), 3);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.0]);
    }

    #[test]
    fn test_input_source_discards_backlog_on_start() {
        let (src, mut feed) = InputSource::new(16);
        feed.push(&[1.0; 10]);
        src.start().unwrap();
        assert_eq!(src.queued(), 0);
    }

    #[test]
    fn test_input_source_device_failure() {
        let (src, feed) = InputSource::new(16);
        feed.fail("permission denied");
        let err = src.start().unwrap_err();
        assert!(matches!(err, EngineError::Device(ref r) if r == "permission denied"));
        assert!(!src.is_active());
    }

    #[test]
    fn test_dropped_feed_is_device_error() {
        let (src, feed) = InputSource::new(16);
        drop(feed);
        assert!(matches!(src.start(), Err(EngineError::Device(_))));
    }
}
