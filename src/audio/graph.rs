//! Chain Graph - explicit node/edge model with topological ordering
//!
//! The graph is immutable once built: a rewire builds a fresh graph and the
//! chain publishes it as a whole.

use super::edge::{Edge, EdgeId};
use super::node::{NodeHandle, NodeType};
use crate::error::{EngineError, Result};
use std::collections::{HashMap, VecDeque};

/// ノードとエッジの集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainGraph {
    /// ノード（宣言順）
    nodes: Vec<(NodeHandle, NodeType)>,
    edges: Vec<Edge>,
    /// 処理順序（トポロジカルソート済み）
    processing_order: Vec<NodeHandle>,
    next_edge_id: u32,
}

impl ChainGraph {
    pub fn new() -> Self {
        Self {
            next_edge_id: 1,
            ..Default::default()
        }
    }

    /// Build `head -> nodes[0] -> ... -> nodes[n-1] -> tail`.
    ///
    /// Edge ids are assigned in order, so two builds from the same inputs
    /// compare equal.
    pub fn linear(
        head: NodeHandle,
        nodes: &[(NodeHandle, NodeType)],
        tail: NodeHandle,
    ) -> Result<Self> {
        let mut graph = Self::new();
        graph.add_node(head, NodeType::Source)?;
        for &(handle, node_type) in nodes {
            graph.add_node(handle, node_type)?;
        }
        graph.add_node(tail, NodeType::Output)?;

        let path: Vec<NodeHandle> = std::iter::once(head)
            .chain(nodes.iter().map(|(h, _)| *h))
            .chain(std::iter::once(tail))
            .collect();
        for pair in path.windows(2) {
            graph.add_edge(pair[0], pair[1])?;
        }

        graph.rebuild_order()?;
        Ok(graph)
    }

    /// ノードを追加
    pub fn add_node(&mut self, handle: NodeHandle, node_type: NodeType) -> Result<()> {
        if self.contains(handle) {
            return Err(EngineError::config(format!("duplicate node {}", handle.raw())));
        }
        self.nodes.push((handle, node_type));
        Ok(())
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.iter().any(|(h, _)| *h == handle)
    }

    pub fn node_type(&self, handle: NodeHandle) -> Option<NodeType> {
        self.nodes.iter().find(|(h, _)| *h == handle).map(|(_, t)| *t)
    }

    /// エッジを追加
    ///
    /// Fan-out is allowed, fan-in is not: a node has at most one upstream.
    pub fn add_edge(&mut self, source: NodeHandle, target: NodeHandle) -> Result<EdgeId> {
        if !self.contains(source) || !self.contains(target) {
            return Err(EngineError::config("edge endpoint is not in the graph"));
        }
        if source == target {
            return Err(EngineError::config("self-loop"));
        }
        if self.edges.iter().any(|e| e.target == target) {
            return Err(EngineError::config(format!(
                "node {} already has an upstream connection",
                target.raw()
            )));
        }

        let id = EdgeId::new(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.push(Edge::new(id, source, target));
        Ok(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// ソースノードからのエッジを取得
    pub fn edges_from(&self, source: NodeHandle) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// The single upstream of `target`, if connected
    pub fn upstream(&self, target: NodeHandle) -> Option<NodeHandle> {
        self.edges.iter().find(|e| e.target == target).map(|e| e.source)
    }

    pub fn processing_order(&self) -> &[NodeHandle] {
        &self.processing_order
    }

    /// Effect nodes in processing order
    pub fn effect_order(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.processing_order
            .iter()
            .copied()
            .filter(|h| matches!(self.node_type(*h), Some(NodeType::Effect(_))))
    }

    /// 処理順序を再計算
    pub fn rebuild_order(&mut self) -> Result<()> {
        self.processing_order = self.topological_sort()?;
        Ok(())
    }

    /// トポロジカルソート (Kahn's algorithm)
    fn topological_sort(&self) -> Result<Vec<NodeHandle>> {
        let mut in_degree: HashMap<NodeHandle, usize> =
            self.nodes.iter().map(|(h, _)| (*h, 0)).collect();
        for edge in &self.edges {
            if let Some(deg) = in_degree.get_mut(&edge.target) {
                *deg += 1;
            }
        }

        // Declaration order among roots keeps the result deterministic
        let mut queue: VecDeque<NodeHandle> = self
            .nodes
            .iter()
            .map(|(h, _)| *h)
            .filter(|h| in_degree.get(h) == Some(&0))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(handle) = queue.pop_front() {
            result.push(handle);
            for edge in self.edges_from(handle) {
                if let Some(deg) = in_degree.get_mut(&edge.target) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        queue.push_back(edge.target);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(EngineError::config(format!(
                "cycle detected: ordered {} of {} nodes",
                result.len(),
                self.nodes.len()
            )));
        }
        Ok(result)
    }
}
