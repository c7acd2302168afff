use parking_lot::Mutex;

use crate::geometry::aabb::Aabb;
use crate::geometry::math::segment_closest_points;
use crate::graph::Graph;
use crate::model::{EdgeCrossing, PointCloud, Vec3};

/// Detects near-intersections between edge segments and promotes them into
/// graph nodes. Crossing nodes occupy indices at or past `start_index`, the
/// node count at handler construction time.
///
/// Crossings that are geometrically coincident but come from different edge
/// pairs are not merged; each pair yields its own node.
#[derive(Debug)]
pub struct EdgeCrossingsHandler {
    pub tolerance: f64,
    pub squared_tolerance: f64,
    segment_bounds: Vec<Aabb>,
    crossings: Mutex<Vec<EdgeCrossing>>,
    num_edges: usize,
    pub start_index: u32,
}

impl EdgeCrossingsHandler {
    pub fn new(graph: &Graph, tolerance: f64) -> Self {
        EdgeCrossingsHandler {
            tolerance,
            squared_tolerance: tolerance * tolerance,
            segment_bounds: Vec::new(),
            crossings: Mutex::new(Vec::new()),
            num_edges: graph.edge_count(),
            start_index: graph.node_count() as u32,
        }
    }

    fn segment(graph: &Graph, cloud: &PointCloud, edge: u32) -> (Vec3, Vec3) {
        let e = &graph.edges[edge as usize];
        let a = cloud.position(graph.nodes[e.start as usize].point_index);
        let b = cloud.position(graph.nodes[e.end as usize].point_index);
        (a, b)
    }

    /// Caches one tolerance-padded box per edge segment.
    pub fn prepare(&mut self, graph: &Graph, cloud: &PointCloud) {
        self.segment_bounds.clear();
        self.segment_bounds.reserve(self.num_edges);
        for i in 0..self.num_edges {
            let (a, b) = Self::segment(graph, cloud, i as u32);
            self.segment_bounds.push(Aabb::from_segment(a, b).expanded(self.tolerance));
        }
    }

    /// Tests edge `edge_index` against every later edge. Safe to call
    /// concurrently for distinct indices; recorded crossings go through a
    /// lock, everything else is read-only.
    pub fn process_edge(&self, edge_index: u32, graph: &Graph, cloud: &PointCloud) {
        let edge = &graph.edges[edge_index as usize];
        let bounds = &self.segment_bounds[edge_index as usize];
        let (a0, a1) = Self::segment(graph, cloud, edge_index);

        for other_index in (edge_index as usize + 1)..self.num_edges {
            let other = &graph.edges[other_index];
            if edge.contains(other.start) || edge.contains(other.end) {
                continue;
            }
            if !bounds.intersects(&self.segment_bounds[other_index]) {
                continue;
            }

            let (b0, b1) = Self::segment(graph, cloud, other_index as u32);
            let (pa, pb) = segment_closest_points(a0, a1, b0, b1);
            if pa.dist_sq(pb) >= self.squared_tolerance {
                continue;
            }

            self.crossings.lock().push(EdgeCrossing {
                edge_a: edge_index,
                edge_b: other_index as u32,
                center: pa.lerp(pb, 0.5),
            });
        }
    }

    pub fn crossing_count(&self) -> usize {
        self.crossings.lock().len()
    }

    /// Consumes the recorded crossings: each becomes a new point and node,
    /// the two original edges are invalidated, and four replacement edges
    /// connect the original endpoints to the crossing node.
    pub fn insert_crossings(self, graph: &mut Graph, cloud: &mut PointCloud) {
        for crossing in self.crossings.into_inner() {
            let (a_start, a_end) = {
                let e = &graph.edges[crossing.edge_a as usize];
                (e.start, e.end)
            };
            let (b_start, b_end) = {
                let e = &graph.edges[crossing.edge_b as usize];
                (e.start, e.end)
            };

            cloud.positions.push(crossing.center);
            let point_index = (cloud.len() - 1) as u32;
            let node = graph.add_crossing_node(point_index);
            debug_assert!(node >= self.start_index);

            graph.edges[crossing.edge_a as usize].set_valid(false);
            graph.edges[crossing.edge_b as usize].set_valid(false);

            let _ = graph.insert_edge(a_start, node);
            let _ = graph.insert_edge(a_end, node);
            let _ = graph.insert_edge(b_start, node);
            let _ = graph.insert_edge(b_end, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross_setup() -> (Graph, PointCloud) {
        let cloud = PointCloud::from_positions(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        ]);
        let mut graph = Graph::new(4);
        graph.insert_edges(&[(0, 1), (2, 3)]);
        (graph, cloud)
    }

    #[test]
    fn crossing_promotes_one_node() {
        let (mut graph, mut cloud) = cross_setup();
        let mut handler = EdgeCrossingsHandler::new(&graph, 0.1);
        handler.prepare(&graph, &cloud);
        for i in 0..graph.edge_count() as u32 {
            handler.process_edge(i, &graph, &cloud);
        }
        assert_eq!(handler.crossing_count(), 1);
        handler.insert_crossings(&mut graph, &mut cloud);

        assert_eq!(graph.node_count(), 5);
        let center = cloud.position(graph.nodes[4].point_index);
        assert!(center.dist_sq(Vec3::new(5.0, 5.0, 0.0)) < 0.1 * 0.1);
        assert!(graph.nodes[4].crossing);

        // Originals invalidated, four replacements valid
        assert!(!graph.edges[0].is_valid());
        assert!(!graph.edges[1].is_valid());
        let valid: Vec<_> = graph.edges.iter().filter(|e| e.is_valid()).collect();
        assert_eq!(valid.len(), 4);
        for e in valid {
            assert!(e.contains(4));
        }
    }

    #[test]
    fn distant_segments_do_not_cross() {
        let cloud = PointCloud::from_positions(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(10.0, 5.0, 0.0),
        ]);
        let mut graph = Graph::new(4);
        graph.insert_edges(&[(0, 1), (2, 3)]);
        let mut handler = EdgeCrossingsHandler::new(&graph, 0.1);
        handler.prepare(&graph, &cloud);
        for i in 0..graph.edge_count() as u32 {
            handler.process_edge(i, &graph, &cloud);
        }
        assert_eq!(handler.crossing_count(), 0);
    }

    #[test]
    fn shared_endpoint_pairs_are_skipped() {
        let cloud = PointCloud::from_positions(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
        ]);
        let mut graph = Graph::new(3);
        graph.insert_edges(&[(0, 1), (1, 2)]);
        let mut handler = EdgeCrossingsHandler::new(&graph, 0.5);
        handler.prepare(&graph, &cloud);
        for i in 0..graph.edge_count() as u32 {
            handler.process_edge(i, &graph, &cloud);
        }
        assert_eq!(handler.crossing_count(), 0);
    }
}
