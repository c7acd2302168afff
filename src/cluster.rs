use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use crate::geometry::aabb::Aabb;
use crate::geometry::math::segment_dist_sq;
use crate::geometry::octree::Octree;
use crate::graph::Graph;
use crate::model::{pack, unpack, PointCloud, SubGraph, Vec3};

/// Node of a cluster, indexed locally. `point_index` keeps the back-reference
/// into the source point set; adjacency entries are local (other, edge) pairs.
#[derive(Clone, Debug)]
pub struct ClusterNode {
    pub index: u32,
    pub point_index: u32,
    pub adjacency: Vec<u64>,
}

/// Cluster-local edge; `source` points back at the graph edge it was copied
/// from. Validity is this cluster's private working flag.
#[derive(Debug)]
pub struct ClusterEdge {
    pub index: u32,
    pub source: u32,
    pub start: u32,
    pub end: u32,
    valid: AtomicBool,
}

impl ClusterEdge {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_valid(&self, v: bool) {
        self.valid.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn other(&self, node: u32) -> u32 {
        if self.start == node { self.end } else { self.start }
    }

    #[inline]
    pub fn contains(&self, node: u32) -> bool {
        self.start == node || self.end == node
    }
}

/// Cached endpoint data for one cluster edge.
#[derive(Clone, Copy, Debug)]
pub struct ExpandedEdge {
    pub index: u32,
    pub a: Vec3,
    pub b: Vec3,
    pub length_sq: f64,
    pub bounds: Aabb,
}

/// Read-mostly projection of a subgraph: a private working copy of its edges,
/// per-node positions, and lazily built geometric caches. The octrees and
/// expanded edges are built once (synchronously, before parallel dispatch)
/// and shared immutably afterwards; only edge validity flags mutate.
#[derive(Debug)]
pub struct Cluster {
    pub nodes: Vec<ClusterNode>,
    pub edges: Vec<ClusterEdge>,
    positions: Vec<Vec3>,
    expanded: OnceCell<Vec<ExpandedEdge>>,
    node_octree: OnceCell<Octree>,
    edge_octree: OnceCell<Octree>,
}

impl Cluster {
    /// Projects one subgraph out of `graph`. Node and edge orderings are
    /// deterministic (sorted by source index).
    pub fn from_subgraph(graph: &Graph, sub: &SubGraph, cloud: &PointCloud) -> Self {
        let mut global_nodes: Vec<u32> = sub.nodes.iter().copied().collect();
        global_nodes.sort_unstable();
        let mut global_edges: Vec<u32> = sub.edges.iter().copied().collect();
        global_edges.sort_unstable();

        Self::project(graph, &global_nodes, &global_edges, cloud)
    }

    /// Projects the whole graph (all valid nodes/edges) as one cluster.
    pub fn from_graph(graph: &Graph, cloud: &PointCloud) -> Self {
        let nodes: Vec<u32> = graph
            .nodes
            .iter()
            .filter(|n| n.valid)
            .map(|n| n.node_index)
            .collect();
        let edges: Vec<u32> = graph
            .edges
            .iter()
            .filter(|e| e.is_valid())
            .map(|e| e.index)
            .collect();
        Self::project(graph, &nodes, &edges, cloud)
    }

    fn project(graph: &Graph, global_nodes: &[u32], global_edges: &[u32], cloud: &PointCloud) -> Self {
        let mut node_map = vec![u32::MAX; graph.node_count()];
        for (local, &global) in global_nodes.iter().enumerate() {
            node_map[global as usize] = local as u32;
        }
        let mut edge_map = vec![u32::MAX; graph.edge_count()];
        for (local, &global) in global_edges.iter().enumerate() {
            edge_map[global as usize] = local as u32;
        }

        let edges: Vec<ClusterEdge> = global_edges
            .iter()
            .enumerate()
            .map(|(local, &global)| {
                let e = &graph.edges[global as usize];
                ClusterEdge {
                    index: local as u32,
                    source: global,
                    start: node_map[e.start as usize],
                    end: node_map[e.end as usize],
                    valid: AtomicBool::new(true),
                }
            })
            .collect();

        let mut positions = Vec::with_capacity(global_nodes.len());
        let nodes: Vec<ClusterNode> = global_nodes
            .iter()
            .enumerate()
            .map(|(local, &global)| {
                let n = &graph.nodes[global as usize];
                positions.push(cloud.position(n.point_index));
                let adjacency = n
                    .adjacency
                    .iter()
                    .filter_map(|&packed| {
                        let (other, edge) = unpack(packed);
                        let edge = edge_map[edge as usize];
                        if edge == u32::MAX {
                            return None;
                        }
                        Some(pack(node_map[other as usize], edge))
                    })
                    .collect();
                ClusterNode { index: local as u32, point_index: n.point_index, adjacency }
            })
            .collect();

        Cluster {
            nodes,
            edges,
            positions,
            expanded: OnceCell::new(),
            node_octree: OnceCell::new(),
            edge_octree: OnceCell::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn position(&self, node: u32) -> Vec3 {
        self.positions[node as usize]
    }

    #[inline]
    pub fn dist_sq(&self, a: u32, b: u32) -> f64 {
        self.position(a).dist_sq(self.position(b))
    }

    #[inline]
    pub fn dir(&self, from: u32, to: u32) -> Vec3 {
        self.position(from).dir_to(self.position(to))
    }

    pub fn expanded_edges(&self) -> &[ExpandedEdge] {
        self.expanded.get_or_init(|| {
            self.edges
                .iter()
                .map(|e| {
                    let a = self.position(e.start);
                    let b = self.position(e.end);
                    ExpandedEdge {
                        index: e.index,
                        a,
                        b,
                        length_sq: a.dist_sq(b),
                        bounds: Aabb::from_segment(a, b),
                    }
                })
                .collect()
        })
    }

    pub fn node_octree(&self) -> &Octree {
        self.node_octree
            .get_or_init(|| Octree::from_points(self.positions.iter().copied()))
    }

    pub fn edge_octree(&self) -> &Octree {
        self.edge_octree
            .get_or_init(|| Octree::build(self.expanded_edges().iter().map(|e| e.bounds).collect()))
    }

    /// Squared minimum distance between two cluster edges' segments.
    pub fn edge_dist_sq(&self, a: u32, b: u32) -> f64 {
        let ea = &self.expanded_edges()[a as usize];
        let eb = &self.expanded_edges()[b as usize];
        segment_dist_sq(ea.a, ea.b, eb.a, eb.b)
    }

    /// Source-graph edge indices of surviving edges, in edge-index order.
    pub fn valid_edges(&self) -> Vec<u32> {
        self.edges
            .iter()
            .filter(|e| e.is_valid())
            .map(|e| e.source)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_is_local_and_complete() {
        let cloud = PointCloud::from_positions(
            (0..6).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect(),
        );
        let mut graph = Graph::new(6);
        graph.insert_edges(&[(0, 1), (1, 2), (4, 5)]);
        graph.build_subgraphs();

        let sub = graph
            .subgraphs
            .iter()
            .find(|s| s.nodes.len() == 3)
            .unwrap();
        let cluster = Cluster::from_subgraph(&graph, sub, &cloud);

        assert_eq!(cluster.num_nodes(), 3);
        assert_eq!(cluster.num_edges(), 2);
        // Local indices are dense; point back-references survive
        for (i, n) in cluster.nodes.iter().enumerate() {
            assert_eq!(n.index as usize, i);
            assert!(n.point_index <= 2);
        }
        let mid = &cluster.nodes[1];
        assert_eq!(mid.adjacency.len(), 2);
    }

    #[test]
    fn expanded_edges_cache_lengths() {
        let cloud = PointCloud::from_positions(vec![
            Vec3::ZERO,
            Vec3::new(3.0, 4.0, 0.0),
        ]);
        let mut graph = Graph::new(2);
        graph.insert_edge(0, 1).unwrap();
        graph.build_subgraphs();
        let cluster = Cluster::from_subgraph(&graph, &graph.subgraphs[0], &cloud);

        let ee = &cluster.expanded_edges()[0];
        assert!((ee.length_sq - 25.0).abs() < 1e-12);
        assert!(std::ptr::eq(cluster.expanded_edges(), cluster.expanded_edges()));
    }
}
