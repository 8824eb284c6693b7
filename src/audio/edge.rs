//! Edge - a directed connection between two nodes

use super::node::NodeHandle;

/// Edge の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(u32);

impl EdgeId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// エッジ
///
/// ソースノードの出力からターゲットノードの入力への接続。
/// An edge is the audio stream itself: it has no lifetime of its own beyond
/// the topology that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeHandle,
    pub target: NodeHandle,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeHandle, target: NodeHandle) -> Self {
        Self { id, source, target }
    }
}
