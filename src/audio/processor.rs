//! Chain Processor - the real-time block path
//!
//! Owned by whoever drives the audio clock. Each block:
//!
//! 1. load the published topology once
//! 2. pull the block from the bound source (silence if none or stopped)
//! 3. write the original tap
//! 4. run the effects in route order
//! 5. write the processed tap, feed the recorder
//! 6. copy to the output
//!
//! Nothing here waits on the control side: parameters are atomic loads,
//! the topology is a pointer load, taps are lock-free, and the recorder only
//! `try_lock`s.

use super::buffer::AudioBuffer;
use super::chain::{EffectChain, Topology};
use super::meters::{ChainMeters, PortMeter};
use super::node::Effect;
use super::params::ParamBank;
use super::recorder::Recorder;
use super::tap::TapPoint;
use super::MAX_FRAMES;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{debug, trace};

/// DSP state of one effect plus the cells it reads
struct EffectSlot {
    effect: Box<dyn Effect>,
    params: Arc<ParamBank>,
}

/// オーディオコールバックから呼び出され、チェーン全体を処理
pub struct ChainProcessor {
    topology: Arc<ArcSwap<Topology>>,
    /// Indexed by `NodeHandle::index()`
    effects: Vec<Option<EffectSlot>>,
    tap_original: Arc<TapPoint>,
    tap_processed: Arc<TapPoint>,
    recorder: Arc<Recorder>,
    meters: Arc<ArcSwap<ChainMeters>>,
    block_size: usize,
    head: AudioBuffer,
    work: AudioBuffer,
    blocks: u64,
    /// Whether the previous block had a producing source
    was_live: bool,
}

impl ChainProcessor {
    pub(crate) fn new(
        chain: &EffectChain,
        recorder: Arc<Recorder>,
        meters: Arc<ArcSwap<ChainMeters>>,
        sample_rate: f32,
        block_size: usize,
    ) -> Self {
        let slots = chain
            .nodes()
            .iter()
            .map(|n| n.handle().index())
            .max()
            .map_or(0, |max| max + 1);
        let mut effects: Vec<Option<EffectSlot>> = (0..slots).map(|_| None).collect();
        for node in chain.nodes() {
            effects[node.handle().index()] = Some(EffectSlot {
                effect: node.kind().build(sample_rate),
                params: node.bank(),
            });
        }

        Self {
            topology: chain.topology_cell(),
            effects,
            tap_original: chain.tap_original(),
            tap_processed: chain.tap_processed(),
            recorder,
            meters,
            block_size: block_size.clamp(1, MAX_FRAMES),
            head: AudioBuffer::new(),
            work: AudioBuffer::new(),
            blocks: 0,
            was_live: false,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks processed since creation
    pub fn blocks_processed(&self) -> u64 {
        self.blocks
    }

    /// Fill `out` with processed audio.
    ///
    /// `out` is split into `block_size` chunks; each chunk sees exactly one
    /// topology.
    pub fn process(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(self.block_size) {
            self.process_block(chunk);
        }
    }

    /// Process a single block of at most `block_size` frames
    pub fn process_block(&mut self, out: &mut [f32]) {
        let frames = out.len().min(self.block_size);
        let topology = self.topology.load();

        self.head.clear(frames);
        let live = match topology.source() {
            Some(active) => {
                // A switch that replaced this snapshot may already have stopped
                // its source; the block still belongs to the snapshot.
                let live = active.source.is_active()
                    || !Arc::ptr_eq(&*topology, &*self.topology.load());
                if live {
                    active.source.read(self.head.samples_mut());
                }
                live
            }
            None => false,
        };

        // Tails from before a stop must not resurface on the next play
        if self.was_live && !live {
            debug!("[Processor] Source went idle, clearing effect state");
            self.reset();
        }
        self.was_live = live;

        self.head.update_peak();
        self.tap_original.write(self.head.samples());

        self.work.write_samples(self.head.samples());
        if live {
            for handle in topology.route() {
                if let Some(Some(slot)) = self.effects.get_mut(handle.index()) {
                    slot.effect.process(&slot.params, self.work.samples_mut());
                }
            }
        }
        self.work.update_peak();

        self.tap_processed.write(self.work.samples());
        self.recorder.capture(self.work.samples());

        out[..frames].copy_from_slice(self.work.samples());
        out[frames..].fill(0.0);

        self.blocks += 1;
        self.publish_meters();
        trace!("[Processor] Block {} ({} frames, live={})", self.blocks, frames, live);
    }

    fn publish_meters(&self) {
        self.meters.store(Arc::new(ChainMeters {
            block: self.blocks,
            original: PortMeter::from_samples(self.head.samples(), self.head.cached_peak()),
            processed: PortMeter::from_samples(self.work.samples(), self.work.cached_peak()),
        }));
    }

    /// Clear every effect's internal state
    pub fn reset(&mut self) {
        for slot in self.effects.iter_mut().flatten() {
            slot.effect.reset();
        }
    }
}
