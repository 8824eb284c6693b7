//! Export sink
//!
//! Takes sealed recordings only, so an export can never observe a buffer
//! that the audio path is still appending to.

use crate::audio::SealedRecording;
use crate::error::{EngineError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What was written
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub recording_id: Uuid,
    pub path: PathBuf,
    pub frames: usize,
    /// Samples that were outside -1.0..=1.0 and got clipped
    pub clipped: usize,
}

/// 16-bit mono PCM WAV writer
#[derive(Debug, Default, Clone, Copy)]
pub struct WavExporter;

impl WavExporter {
    pub fn new() -> Self {
        Self
    }

    fn spec(sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Float sample to 16-bit PCM, clipping at full scale
    pub fn to_pcm(sample: f32) -> (i16, bool) {
        if !sample.is_finite() {
            return (0, true);
        }
        let clipped = !(-1.0..=1.0).contains(&sample);
        let amplitude = i16::MAX as f32;
        ((sample.clamp(-1.0, 1.0) * amplitude).round() as i16, clipped)
    }

    pub fn write(&self, recording: &SealedRecording, path: impl AsRef<Path>) -> Result<ExportSummary> {
        let path = path.as_ref();
        let mut writer = hound::WavWriter::create(path, Self::spec(recording.sample_rate()))?;
        let mut clipped = 0;
        for &sample in recording.samples() {
            let (pcm, was_clipped) = Self::to_pcm(sample);
            if was_clipped {
                clipped += 1;
            }
            writer.write_sample(pcm)?;
        }
        writer.finalize()?;

        if clipped > 0 {
            warn!("[Export] {} samples clipped in {:?}", clipped, path);
        }
        info!(
            "[Export] Wrote {} frames of recording {} to {:?}",
            recording.len(),
            recording.id(),
            path
        );
        Ok(ExportSummary {
            recording_id: recording.id(),
            path: path.to_path_buf(),
            frames: recording.len(),
            clipped,
        })
    }
}

struct ExportJob {
    id: u64,
    recording: SealedRecording,
    path: PathBuf,
}

/// Completion report for one submitted job
#[derive(Debug)]
pub struct ExportResult {
    pub job: u64,
    pub outcome: Result<ExportSummary>,
}

/// Runs exports on a background thread so callers never wait on encoding
pub struct ExportWorker {
    jobs: Option<Sender<ExportJob>>,
    results: Receiver<ExportResult>,
    thread: Option<JoinHandle<()>>,
    next_job: u64,
}

impl ExportWorker {
    pub fn spawn() -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<ExportJob>();
        let (result_tx, result_rx) = unbounded::<ExportResult>();

        let thread = thread::Builder::new()
            .name("fxchain-export".into())
            .spawn(move || {
                let exporter = WavExporter::new();
                // Ends when every sender is dropped
                for job in job_rx.iter() {
                    debug!("[Export] Job {} started", job.id);
                    let outcome = exporter.write(&job.recording, &job.path);
                    if result_tx
                        .send(ExportResult {
                            job: job.id,
                            outcome,
                        })
                        .is_err()
                    {
                        debug!("[Export] Result receiver gone, dropping job {} report", job.id);
                    }
                }
                debug!("[Export] Worker stopped");
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            thread: Some(thread),
            next_job: 1,
        })
    }

    /// Queue a recording; returns the job id reported back on `results()`
    pub fn submit(&mut self, recording: SealedRecording, path: impl Into<PathBuf>) -> Result<u64> {
        let id = self.next_job;
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| EngineError::config("export worker is shut down"))?;
        jobs.send(ExportJob {
            id,
            recording,
            path: path.into(),
        })
        .map_err(|_| EngineError::config("export worker is not running"))?;
        self.next_job += 1;
        Ok(id)
    }

    pub fn results(&self) -> &Receiver<ExportResult> {
        &self.results
    }

    /// Finish queued jobs and join the thread
    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("[Export] Worker thread panicked");
            }
        }
    }
}

impl Drop for ExportWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
