use crate::cluster::Cluster;
use crate::geometry::aabb::Aabb;

/// Gabriel-graph test: an edge survives iff no other node lies strictly
/// inside the open sphere whose diameter is the edge segment. `invert` flips
/// the polarity (edges start invalid, witnesses validate them).
#[derive(Clone, Copy, Debug, Default)]
pub struct Gabriel {
    pub invert: bool,
}

impl Gabriel {
    pub fn default_edge_validity(&self) -> bool {
        !self.invert
    }

    pub fn process_edge(&self, cluster: &Cluster, edge_index: usize) {
        let edge = &cluster.edges[edge_index];
        let ee = &cluster.expanded_edges()[edge_index];
        let center = ee.a.lerp(ee.b, 0.5);
        let radius_sq = center.dist_sq(ee.a);

        let query = Aabb::from_center_extent(center, radius_sq.sqrt());
        cluster.node_octree().find_first(&query, |node| {
            // The endpoints sit exactly on the sphere; skip them so float
            // noise cannot count them as witnesses.
            if node == edge.start || node == edge.end {
                return true;
            }
            if center.dist_sq(cluster.position(node)) < radius_sq {
                edge.set_valid(self.invert);
                return false;
            }
            true
        });
    }
}
