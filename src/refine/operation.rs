use super::gabriel::Gabriel;
use super::keep_by_filter::KeepByFilter;
use super::mst::MstReduce;
use super::overlap::RemoveOverlap;
use crate::cluster::Cluster;
use crate::heuristics::Heuristics;

/// Closed family of edge-refinement strategies. Capability accessors drive
/// the dispatch: per-edge and per-node variants run chunked in parallel,
/// globally-coupled ones get a single `process` call.
#[derive(Clone, Copy, Debug)]
pub enum Refinement {
    KeepByFilter(KeepByFilter),
    Gabriel(Gabriel),
    RemoveOverlap(RemoveOverlap),
    MstReduce(MstReduce),
}

impl Refinement {
    /// Starting polarity written to every edge before the algorithm runs.
    pub fn default_edge_validity(&self) -> bool {
        match self {
            Refinement::KeepByFilter(_) => true,
            Refinement::Gabriel(g) => g.default_edge_validity(),
            Refinement::RemoveOverlap(_) => true,
            Refinement::MstReduce(_) => false,
        }
    }

    pub fn individual_edge_processing(&self) -> bool {
        !matches!(self, Refinement::MstReduce(_))
    }

    /// No built-in variant is node-centric today; the dispatch path exists
    /// for strategies whose unit of decision is a node's neighborhood.
    pub fn individual_node_processing(&self) -> bool {
        false
    }

    pub fn requires_heuristics(&self) -> bool {
        matches!(self, Refinement::MstReduce(_))
    }

    pub fn supports_filters(&self) -> bool {
        matches!(self, Refinement::KeepByFilter(_))
    }

    pub fn wants_node_octree(&self) -> bool {
        matches!(self, Refinement::Gabriel(_))
    }

    pub fn requires_edge_octree(&self) -> bool {
        matches!(self, Refinement::RemoveOverlap(_))
    }

    pub fn process_edge(&self, cluster: &Cluster, edge_index: usize, filter_cache: Option<&[bool]>) {
        match self {
            Refinement::KeepByFilter(op) => op.process_edge(cluster, edge_index, filter_cache),
            Refinement::Gabriel(op) => op.process_edge(cluster, edge_index),
            Refinement::RemoveOverlap(op) => op.process_edge(cluster, edge_index),
            Refinement::MstReduce(_) => {}
        }
    }

    pub fn process_node(&self, _cluster: &Cluster, _node_index: usize) {}

    pub fn process(&self, cluster: &Cluster, heuristics: Option<&dyn Heuristics>) {
        // The heuristics requirement is enforced at setup, before dispatch.
        if let (Refinement::MstReduce(op), Some(h)) = (self, heuristics) {
            op.process(cluster, h);
        }
    }
}
