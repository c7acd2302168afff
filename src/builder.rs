use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crossings::EdgeCrossingsHandler;
use crate::error::{Error, Result};
use crate::geometry::tolerance::DEFAULT_CROSSING_TOLERANCE;
use crate::graph::Graph;
use crate::model::{PointCloud, Vec3};

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Vertex side of a compiled graph: surviving points in dense output order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VertexOutput {
    pub tag: u64,
    pub positions: Vec<Vec3>,
    /// Back-references into the source point set, parallel to `positions`.
    pub source_points: Vec<u32>,
}

/// Edge side of one compiled subgraph; endpoints use the dense remapped
/// vertex indices of the matching [`VertexOutput`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeOutput {
    pub tag: u64,
    pub subgraph_id: i64,
    pub edges: Vec<(u32, u32)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphOutput {
    pub vertices: VertexOutput,
    pub clusters: Vec<EdgeOutput>,
}

impl VertexOutput {
    /// Source point index to dense output index, for relinking datasets that
    /// still reference pre-consolidation indices.
    pub fn remapped_indices(&self) -> HashMap<u32, u32> {
        self.source_points
            .iter()
            .enumerate()
            .map(|(dense, &source)| (source, dense as u32))
            .collect()
    }
}

impl GraphOutput {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Re-pairs vertex and edge outputs that were produced together, keyed by
/// their shared cluster tag.
pub fn pair_by_tag<'a>(
    vertices: &'a [VertexOutput],
    edges: &'a [EdgeOutput],
) -> HashMap<u64, (&'a VertexOutput, Vec<&'a EdgeOutput>)> {
    let mut paired = HashMap::new();
    for v in vertices {
        paired.insert(v.tag, (v, Vec::new()));
    }
    for e in edges {
        if let Some((_, list)) = paired.get_mut(&e.tag) {
            list.push(e);
        }
    }
    paired
}

/// Orchestrates one compile cycle: concurrent edge insertion, optional
/// crossing promotion, component building, consolidation, and the terminal
/// write. Each builder stamps its outputs with a process-unique tag.
pub struct GraphBuilder {
    graph: RwLock<Graph>,
    crossings_tolerance: Option<f64>,
    prune_points: bool,
    pub tag: u64,
    compiled: bool,
}

impl GraphBuilder {
    pub fn new(num_points: usize) -> Self {
        GraphBuilder {
            graph: RwLock::new(Graph::new(num_points)),
            crossings_tolerance: None,
            prune_points: false,
            tag: NEXT_TAG.fetch_add(1, Ordering::Relaxed),
            compiled: false,
        }
    }

    pub fn enable_crossings(&mut self, tolerance: f64) {
        self.crossings_tolerance = Some(tolerance);
    }

    pub fn enable_crossings_default(&mut self) {
        self.enable_crossings(DEFAULT_CROSSING_TOLERANCE);
    }

    pub fn enable_points_pruning(&mut self) {
        self.prune_points = true;
    }

    /// Concurrent producer entry point; the lock is scoped to the mutation.
    pub fn insert_edge(&self, a: u32, b: u32) -> Result<u32> {
        self.graph.write().insert_edge(a, b)
    }

    pub fn insert_edges(&self, batch: &[(u32, u32)]) {
        self.graph.write().insert_edges(batch);
    }

    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.graph.read())
    }

    /// Freezes topology: promotes crossings when enabled, partitions into
    /// subgraphs, prunes by `[min, max]` node count, and remaps indices.
    /// `cloud` gains one point per promoted crossing.
    pub fn compile(&mut self, cloud: &mut PointCloud, min: usize, max: usize) -> Result<()> {
        let graph = self.graph.get_mut();

        if let Some(tolerance) = self.crossings_tolerance {
            let mut handler = EdgeCrossingsHandler::new(graph, tolerance);
            handler.prepare(graph, cloud);
            {
                let graph: &Graph = graph;
                let cloud: &PointCloud = cloud;
                (0..graph.edge_count() as u32)
                    .into_par_iter()
                    .for_each(|i| handler.process_edge(i, graph, cloud));
            }
            handler.insert_crossings(graph, cloud);
        }

        graph.build_subgraphs();
        graph.consolidate(self.prune_points, min, max);
        graph.consolidate_indices(self.prune_points);

        if graph.subgraphs.is_empty() {
            warn!(tag = self.tag, "could not build any clusters");
        }
        self.compiled = true;
        Ok(())
    }

    /// Terminal consumer: serializes surviving nodes and per-subgraph edges,
    /// all stamped with this builder's tag. Degenerate subgraphs are skipped
    /// with a warning.
    pub fn write(&self, cloud: &PointCloud) -> Result<GraphOutput> {
        if !self.compiled {
            return Err(Error::NotCompiled);
        }
        let graph = self.graph.read();

        let mut positions = Vec::new();
        let mut source_points = Vec::new();
        for node in &graph.nodes {
            if graph.remapped_index(node.node_index).is_none() {
                continue;
            }
            positions.push(cloud.position(node.point_index));
            source_points.push(node.point_index);
        }

        let mut clusters = Vec::new();
        graph.for_each_cluster(|sub| {
            let mut edge_indices: Vec<u32> = sub.edges.iter().copied().collect();
            edge_indices.sort_unstable();

            let mut edges = Vec::with_capacity(edge_indices.len());
            for e in edge_indices {
                let edge = &graph.edges[e as usize];
                if !edge.is_valid() {
                    continue;
                }
                if let (Some(a), Some(b)) =
                    (graph.remapped_index(edge.start), graph.remapped_index(edge.end))
                {
                    edges.push((a, b));
                }
            }
            if edges.is_empty() {
                warn!(tag = self.tag, subgraph = sub.id, "empty subgraph skipped at write");
                return;
            }
            clusters.push(EdgeOutput { tag: self.tag, subgraph_id: sub.id, edges });
        });

        Ok(GraphOutput {
            vertices: VertexOutput { tag: self.tag, positions, source_points },
            clusters,
        })
    }
}
