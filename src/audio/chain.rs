//! Effect Chain - control-side owner of nodes, sources and topology
//!
//! The chain is created once. Afterwards only parameter values and the
//! source binding change. A rewire never edits the live topology: it builds
//! a fresh [`Topology`] and publishes it with a single pointer swap, so the
//! audio path observes either the old wiring or the new one, never a mix.

use super::graph::ChainGraph;
use super::node::{EffectKind, EffectNode, NodeHandle, NodeType};
use super::source::{SignalSource, SourceKind};
use super::tap::{TapPoint, TapPosition};
use crate::error::{EngineError, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source currently wired into the chain head
#[derive(Clone)]
pub struct ActiveSource {
    pub kind: SourceKind,
    pub source: Arc<dyn SignalSource>,
}

impl fmt::Debug for ActiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSource")
            .field("kind", &self.kind)
            .field("active", &self.source.is_active())
            .finish()
    }
}

/// Immutable wiring snapshot published to the audio path
#[derive(Debug, Clone)]
pub struct Topology {
    source: Option<ActiveSource>,
    graph: ChainGraph,
    /// Effect handles in processing order
    route: Vec<NodeHandle>,
}

impl Topology {
    fn new(source: Option<ActiveSource>, graph: ChainGraph) -> Self {
        let route = graph.effect_order().collect();
        Self { source, graph, route }
    }

    pub fn source(&self) -> Option<&ActiveSource> {
        self.source.as_ref()
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source.as_ref().map(|s| s.kind)
    }

    pub fn graph(&self) -> &ChainGraph {
        &self.graph
    }

    pub fn route(&self) -> &[NodeHandle] {
        &self.route
    }
}

/// Same source instance, same wiring
impl PartialEq for Topology {
    fn eq(&self, other: &Self) -> bool {
        let same_source = match (&self.source, &other.source) {
            (None, None) => true,
            (Some(a), Some(b)) => a.kind == b.kind && Arc::ptr_eq(&a.source, &b.source),
            _ => false,
        };
        same_source && self.graph == other.graph
    }
}

pub struct EffectChain {
    nodes: Vec<EffectNode>,
    head: NodeHandle,
    output: NodeHandle,
    sources: Mutex<HashMap<SourceKind, Arc<dyn SignalSource>>>,
    topology: Arc<ArcSwap<Topology>>,
    /// Serializes rewires and play/stop
    control: Mutex<()>,
    tap_original: Arc<TapPoint>,
    tap_processed: Arc<TapPoint>,
}

impl EffectChain {
    /// Build `head -> order[0] -> ... -> output` with no source bound.
    pub fn new(order: &[EffectKind], tap_capacity: usize) -> Result<Self> {
        if order.is_empty() {
            return Err(EngineError::config("effect chain is empty"));
        }
        // Parameters are addressed by kind
        for (i, kind) in order.iter().enumerate() {
            if order[..i].contains(kind) {
                return Err(EngineError::config(format!(
                    "effect '{}' appears more than once in the chain",
                    kind
                )));
            }
        }

        let head = NodeHandle::new(0);
        let nodes: Vec<EffectNode> = order
            .iter()
            .enumerate()
            .map(|(i, &kind)| EffectNode::new(NodeHandle::new(i as u32 + 1), kind))
            .collect();
        let output = NodeHandle::new(order.len() as u32 + 1);
        let graph = Self::build_graph(head, &nodes, output)?;

        let chain = Self {
            nodes,
            head,
            output,
            sources: Mutex::new(HashMap::new()),
            topology: Arc::new(ArcSwap::from_pointee(Topology::new(None, graph))),
            control: Mutex::new(()),
            tap_original: Arc::new(TapPoint::new(TapPosition::Original, tap_capacity)),
            tap_processed: Arc::new(TapPoint::new(TapPosition::Processed, tap_capacity)),
        };
        debug!(
            "[Chain] Built chain: {}",
            order.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(" -> ")
        );
        Ok(chain)
    }

    fn build_graph(head: NodeHandle, nodes: &[EffectNode], output: NodeHandle) -> Result<ChainGraph> {
        let effects: Vec<(NodeHandle, NodeType)> = nodes
            .iter()
            .map(|n| (n.handle(), NodeType::Effect(n.kind())))
            .collect();
        ChainGraph::linear(head, &effects, output)
    }

    // =========================================================================
    // Sources
    // =========================================================================

    /// Make a source selectable by its kind.
    ///
    /// Replaces any source previously registered for that kind. A replaced
    /// source that is currently wired stays wired until the next `set_source`.
    pub fn register_source(&self, source: Arc<dyn SignalSource>) {
        let kind = source.kind();
        if self.sources.lock().insert(kind, source).is_some() {
            debug!("[Chain] Replaced {} source", kind);
        } else {
            debug!("[Chain] Registered {} source", kind);
        }
    }

    /// Wire `kind` into the chain head, replacing the current source.
    ///
    /// The new source is started if it is not already producing. On any
    /// error the published topology is untouched.
    pub fn set_source(&self, kind: SourceKind) -> Result<()> {
        let _control = self.control.lock();

        let source = self
            .sources
            .lock()
            .get(&kind)
            .cloned()
            .ok_or_else(|| EngineError::config(format!("no {} source is registered", kind)))?;

        if !source.is_active() {
            source.start()?;
        }

        let graph = Self::build_graph(self.head, &self.nodes, self.output)?;
        let next = Topology::new(
            Some(ActiveSource {
                kind,
                source: Arc::clone(&source),
            }),
            graph,
        );
        let previous = self.topology.swap(Arc::new(next));

        // New blocks no longer reach the old source; a block in flight finishes on it
        if let Some(old) = previous.source() {
            if !Arc::ptr_eq(&old.source, &source) {
                old.source.stop();
                info!("[Chain] Source switched: {} -> {}", old.kind, kind);
                return Ok(());
            }
        }
        info!("[Chain] Source set: {}", kind);
        Ok(())
    }

    /// Parse a source name, then [`set_source`](Self::set_source)
    pub fn set_source_by_name(&self, name: &str) -> Result<()> {
        match name.parse::<SourceKind>() {
            Ok(kind) => self.set_source(kind),
            Err(e) => {
                warn!("[Chain] Rejected source '{}'", name);
                Err(e)
            }
        }
    }

    pub fn active_source(&self) -> Option<SourceKind> {
        self.topology.load().source_kind()
    }

    /// Start (or restart) the wired source
    pub fn play(&self) -> Result<()> {
        let _control = self.control.lock();
        let topology = self.topology.load();
        let active = topology
            .source()
            .ok_or_else(|| EngineError::config("no source selected"))?;
        active.source.start()?;
        info!("[Chain] Play {}", active.kind);
        Ok(())
    }

    /// Stop the wired source; the next block is silent
    pub fn stop(&self) {
        let _control = self.control.lock();
        if let Some(active) = self.topology.load().source() {
            active.source.stop();
            info!("[Chain] Stop {}", active.kind);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.topology
            .load()
            .source()
            .map(|s| s.source.is_active())
            .unwrap_or(false)
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn nodes(&self) -> &[EffectNode] {
        &self.nodes
    }

    pub fn node(&self, kind: EffectKind) -> Option<&EffectNode> {
        self.nodes.iter().find(|n| n.kind() == kind)
    }

    pub fn set_parameter(&self, kind: EffectKind, name: &str, value: f32) -> Result<f32> {
        self.node(kind)
            .ok_or_else(|| EngineError::config(format!("effect '{}' is not in the chain", kind)))?
            .set_parameter(name, value)
    }

    /// Current published wiring
    pub fn topology(&self) -> Arc<Topology> {
        self.topology.load_full()
    }

    pub(crate) fn topology_cell(&self) -> Arc<ArcSwap<Topology>> {
        Arc::clone(&self.topology)
    }

    pub fn head(&self) -> NodeHandle {
        self.head
    }

    pub fn output(&self) -> NodeHandle {
        self.output
    }

    // =========================================================================
    // Taps
    // =========================================================================

    /// Post-source, pre-effects stream
    pub fn tap_original(&self) -> Arc<TapPoint> {
        Arc::clone(&self.tap_original)
    }

    /// Post-gain stream
    pub fn tap_processed(&self) -> Arc<TapPoint> {
        Arc::clone(&self.tap_processed)
    }

    pub fn tap(&self, position: TapPosition) -> Arc<TapPoint> {
        match position {
            TapPosition::Original => self.tap_original(),
            TapPosition::Processed => self.tap_processed(),
        }
    }
}
