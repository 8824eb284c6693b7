//! Tap points
//!
//! A tap is a read-only attachment to a stream in the chain. The audio path
//! is the single writer; any number of readers copy out the most recent
//! window without locking. Readers never stall the writer.
//!
//! Each write is bracketed by a sequence counter (odd while a block is being
//! written). A reader whose copy overlapped a write retries, so a window
//! holds whole blocks. After `READ_ATTEMPTS` overlapping copies the last one
//! is returned as is.

use std::hint;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Default tap capacity (frames). Must cover the largest analysis window.
pub const TAP_CAPACITY: usize = 32768;

const READ_ATTEMPTS: usize = 8;

/// Which point of the chain a tap observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapPosition {
    /// Post-source, pre-effects
    Original,
    /// Post-gain
    Processed,
}

/// Circular window over the last `capacity` frames of one stream
#[derive(Debug)]
pub struct TapPoint {
    position: TapPosition,
    data: Box<[AtomicU32]>,
    write_pos: AtomicUsize,
    frames_written: AtomicU64,
    sequence: AtomicU64,
}

impl TapPoint {
    pub fn new(position: TapPosition, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            position,
            data: (0..capacity).map(|_| AtomicU32::new(0.0f32.to_bits())).collect(),
            write_pos: AtomicUsize::new(0),
            frames_written: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn position(&self) -> TapPosition {
        self.position
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Total frames pushed since creation
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Acquire)
    }

    /// Append one block (audio thread only)
    pub(crate) fn write(&self, samples: &[f32]) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let len = self.data.len();
        let mut pos = self.write_pos.load(Ordering::Relaxed);
        for &sample in samples {
            self.data[pos].store(sample.to_bits(), Ordering::Relaxed);
            pos = (pos + 1) % len;
        }
        self.write_pos.store(pos, Ordering::Relaxed);
        self.frames_written
            .fetch_add(samples.len() as u64, Ordering::Release);

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Copy the most recent `out.len()` frames, oldest first.
    ///
    /// Frames that were never written read as silence. Returns the frame
    /// count the copy corresponds to.
    pub fn read_latest(&self, out: &mut [f32]) -> u64 {
        for _ in 0..READ_ATTEMPTS {
            if let Some(total) = self.try_read(out) {
                return total;
            }
            hint::spin_loop();
        }
        self.copy_window(out)
    }

    /// One copy, or `None` if it overlapped a write
    fn try_read(&self, out: &mut [f32]) -> Option<u64> {
        let before = self.sequence.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }
        let total = self.copy_window(out);
        fence(Ordering::Acquire);
        (self.sequence.load(Ordering::Relaxed) == before).then_some(total)
    }

    fn copy_window(&self, out: &mut [f32]) -> u64 {
        let len = self.data.len();
        let want = out.len().min(len);
        let total = self.frames_written.load(Ordering::Relaxed);
        let write_pos = self.write_pos.load(Ordering::Relaxed);
        let written = total.min(len as u64) as usize;

        let lead = out.len() - want;
        out[..lead].fill(0.0);

        let start = (write_pos + len - want) % len;
        for (i, slot) in out[lead..].iter_mut().enumerate() {
            // Slots older than what has been written are still zero
            let age = want - i;
            *slot = if age > written {
                0.0
            } else {
                f32::from_bits(self.data[(start + i) % len].load(Ordering::Relaxed))
            };
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_read_latest_returns_newest_window() {
        let tap = TapPoint::new(TapPosition::Processed, 8);
        tap.write(&[1.0, 2.0, 3.0]);
        tap.write(&[4.0, 5.0]);

        let mut out = [0.0f32; 3];
        assert_eq!(tap.read_latest(&mut out), 5);
        assert_eq!(out, [3.0, 4.0, 5.0]);
        assert_eq!(tap.frames_written(), 5);
    }

    #[test]
    fn test_wraparound() {
        let tap = TapPoint::new(TapPosition::Original, 4);
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        tap.write(&samples);

        let mut out = [0.0f32; 4];
        tap.read_latest(&mut out);
        assert_eq!(out, [6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_short_history_is_padded_with_silence() {
        let tap = TapPoint::new(TapPosition::Original, 16);
        tap.write(&[0.5, 0.25]);

        let mut out = [9.0f32; 4];
        tap.read_latest(&mut out);
        assert_eq!(out, [0.0, 0.0, 0.5, 0.25]);
    }

    #[test]
    fn test_window_larger_than_capacity() {
        let tap = TapPoint::new(TapPosition::Processed, 2);
        tap.write(&[1.0, 2.0, 3.0]);

        let mut out = [9.0f32; 4];
        tap.read_latest(&mut out);
        assert_eq!(out, [0.0, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_concurrent_reads_see_whole_blocks() {
        const BLOCK: usize = 16;
        let tap = Arc::new(TapPoint::new(TapPosition::Processed, BLOCK * 4));

        let writer = {
            let tap = Arc::clone(&tap);
            thread::spawn(move || {
                for n in 1..=20_000u32 {
                    tap.write(&[n as f32; BLOCK]);
                }
            })
        };

        let mut out = [0.0f32; BLOCK];
        let check = |out: &[f32], total: u64| {
            let expected = (total / BLOCK as u64) as f32;
            assert!(out.iter().all(|&s| s == expected), "{:?} at {}", out, total);
        };
        while !writer.is_finished() {
            if let Some(total) = tap.try_read(&mut out) {
                check(&out, total);
            }
        }
        writer.join().unwrap();

        let total = tap.read_latest(&mut out);
        assert_eq!(total, 20_000 * BLOCK as u64);
        check(&out, total);
    }
}
