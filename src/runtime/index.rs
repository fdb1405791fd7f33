//! Graph indexer
//!
//! Derives per-node outgoing edge lists, incoming degrees and start
//! candidates from a document snapshot. The document is never modified;
//! a new index is built whenever the simulator is pointed at a new snapshot.

use crate::workflow::types::{WorkflowDocument, WorkflowEdge, WorkflowNode};
use petgraph::{
    algo::is_cyclic_directed,
    graph::{DiGraph, NodeIndex},
};
use std::collections::HashMap;

/// Navigation index over one document snapshot
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    /// Edges by source id, in document edge order
    outgoing_by_node: HashMap<String, Vec<WorkflowEdge>>,
    /// Number of edges targeting each id (dangling targets included)
    incoming_degree: HashMap<String, usize>,
    /// Zero in-degree nodes, in document node order
    start_candidates: Vec<String>,
    /// Node id to position in the document's node list
    positions: HashMap<String, usize>,
    is_cyclic: bool,
}

impl GraphIndex {
    /// Build the index for `document`
    ///
    /// Edges whose endpoints are missing are kept in the lists but never
    /// resolve to a node, so navigation through them ends the walk.
    pub fn build(document: &WorkflowDocument) -> Self {
        tracing::debug!(
            "📊 Indexing document '{}' with {} nodes and {} edges",
            document.id,
            document.nodes.len(),
            document.edges.len()
        );

        let mut graph: DiGraph<(), ()> = DiGraph::new();
        let mut node_index: HashMap<&str, NodeIndex> = HashMap::new();
        let mut positions = HashMap::new();
        let mut outgoing_by_node: HashMap<String, Vec<WorkflowEdge>> = HashMap::new();
        let mut incoming_degree: HashMap<String, usize> = HashMap::new();

        for (position, node) in document.nodes.iter().enumerate() {
            if positions.contains_key(&node.id) {
                tracing::warn!("⚠️ Duplicate node id '{}' ignored by the index", node.id);
                continue;
            }
            positions.insert(node.id.clone(), position);
            node_index.insert(node.id.as_str(), graph.add_node(()));
            outgoing_by_node.entry(node.id.clone()).or_default();
            incoming_degree.entry(node.id.clone()).or_insert(0);
        }

        for edge in &document.edges {
            outgoing_by_node
                .entry(edge.source.clone())
                .or_default()
                .push(edge.clone());
            *incoming_degree.entry(edge.target.clone()).or_insert(0) += 1;

            match (node_index.get(edge.source.as_str()), node_index.get(edge.target.as_str())) {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, ());
                }
                _ => tracing::debug!(
                    "  🔗 Dangling edge '{}': '{}' → '{}'",
                    edge.id,
                    edge.source,
                    edge.target
                ),
            }
        }

        let start_candidates: Vec<String> = document
            .nodes
            .iter()
            .enumerate()
            .filter(|(position, node)| positions.get(&node.id) == Some(position))
            .filter(|(_, node)| incoming_degree.get(&node.id).copied().unwrap_or(0) == 0)
            .map(|(_, node)| node.id.clone())
            .collect();

        let is_cyclic = is_cyclic_directed(&graph);
        tracing::debug!(
            "✅ Index ready: {} start candidates, cyclic = {}",
            start_candidates.len(),
            is_cyclic
        );

        Self {
            outgoing_by_node,
            incoming_degree,
            start_candidates,
            positions,
            is_cyclic,
        }
    }

    /// Outgoing edges of `node_id` in document order (empty when none)
    pub fn outgoing(&self, node_id: &str) -> &[WorkflowEdge] {
        self.outgoing_by_node
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn incoming_degree(&self, node_id: &str) -> usize {
        self.incoming_degree.get(node_id).copied().unwrap_or(0)
    }

    pub fn start_candidates(&self) -> &[String] {
        &self.start_candidates
    }

    /// Node a run begins from; none when every node has an incoming edge
    pub fn entry_point(&self) -> Option<&str> {
        self.start_candidates.first().map(String::as_str)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.positions.contains_key(node_id)
    }

    /// Resolve `node_id` against the document this index was built from
    pub fn node<'a>(&self, document: &'a WorkflowDocument, node_id: &str) -> Option<&'a WorkflowNode> {
        self.positions
            .get(node_id)
            .and_then(|&position| document.nodes.get(position))
    }

    /// Whether the existing-node subgraph contains a cycle
    pub fn is_cyclic(&self) -> bool {
        self.is_cyclic
    }
}
