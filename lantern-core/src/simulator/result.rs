use crate::graph::NodeId;
use serde::Serialize;
use std::collections::BTreeMap;

/// When a node ran in the simulated page load, milliseconds since the
/// start of the root.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTiming {
    pub start_ms: f64,
    pub end_ms: f64,
    pub duration_ms: f64,
}

impl NodeTiming {
    pub(crate) fn new(start_ms: f64, end_ms: f64) -> Self {
        Self {
            start_ms,
            end_ms,
            duration_ms: end_ms - start_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStats {
    pub connections_opened: usize,
    /// requests that paid a TCP handshake
    pub cold_handshakes: usize,
    pub cpu_busy_ms: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// end of the last node
    pub time_in_ms: f64,
    pub node_timings: BTreeMap<NodeId, NodeTiming>,
    pub stats: SimulationStats,
}

impl SimulationResult {
    #[inline]
    pub fn timing(&self, node: NodeId) -> Option<&NodeTiming> {
        self.node_timings.get(&node)
    }

    /// Node ids by simulated start time.
    pub fn nodes_by_start(&self) -> Vec<NodeId> {
        let mut nodes: Vec<_> = self.node_timings.iter().collect();
        nodes.sort_by(|(a_id, a), (b_id, b)| {
            a.start_ms.total_cmp(&b.start_ms).then(a_id.cmp(b_id))
        });
        nodes.into_iter().map(|(id, _)| *id).collect()
    }
}
