use crate::cluster::Cluster;
use crate::geometry::tolerance::degrees_to_dot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapKeep {
    Shortest,
    Longest,
}

/// Invalidates the shorter (or longer) of two nearly-touching, non-adjacent
/// edges. An optional angle window restricts the test to near-parallel pairs:
/// the pair qualifies when the angle between directions lies in
/// `[min_angle, max_angle]`, which in |dot| space is the inverted interval
/// `[cos(max_angle), cos(min_angle)]`.
#[derive(Clone, Copy, Debug)]
pub struct RemoveOverlap {
    pub keep: OverlapKeep,
    pub tolerance: f64,
    squared_tolerance: f64,
    // Window bounds in dot space; defaults accept every pair.
    min_dot: f64,
    max_dot: f64,
}

impl RemoveOverlap {
    pub fn new(keep: OverlapKeep, tolerance: f64) -> Self {
        RemoveOverlap {
            keep,
            tolerance,
            squared_tolerance: tolerance * tolerance,
            min_dot: 1.0,
            max_dot: -1.0,
        }
    }

    /// Angles in degrees, `0 <= min_angle <= max_angle <= 90`.
    pub fn with_angle_window(mut self, min_angle: f64, max_angle: f64) -> Self {
        debug_assert!(min_angle <= max_angle);
        self.min_dot = degrees_to_dot(min_angle);
        self.max_dot = degrees_to_dot(max_angle);
        self
    }

    pub fn process_edge(&self, cluster: &Cluster, edge_index: usize) {
        let edge = &cluster.edges[edge_index];
        let ee = &cluster.expanded_edges()[edge_index];
        let length_sq = ee.length_sq;

        let query = ee.bounds.expanded(self.tolerance);
        cluster.edge_octree().find_first(&query, |other_index| {
            if other_index as usize == edge_index {
                return true;
            }
            let other = &cluster.edges[other_index as usize];
            if edge.contains(other.start) || edge.contains(other.end) {
                return true;
            }

            let dot = cluster
                .dir(edge.start, edge.end)
                .dot(cluster.dir(other.start, other.end))
                .abs();
            if dot > self.min_dot || dot < self.max_dot {
                return true;
            }

            if cluster.edge_dist_sq(edge.index, other_index) >= self.squared_tolerance {
                return true;
            }

            let other_length_sq = cluster.expanded_edges()[other_index as usize].length_sq;
            let lose = match self.keep {
                OverlapKeep::Longest => other_length_sq > length_sq,
                OverlapKeep::Shortest => other_length_sq < length_sq,
            };
            if lose {
                edge.set_valid(false);
                return false;
            }
            true
        });
    }
}
