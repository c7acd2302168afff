use crate::cluster::Cluster;

/// Filter-driven keep/discard: the edge-filter cache marks removal
/// candidates, so an edge survives iff its filter result is false. Without a
/// configured chain the cache is absent and edges keep their default
/// validity.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepByFilter;

impl KeepByFilter {
    pub fn process_edge(&self, cluster: &Cluster, edge_index: usize, filter_cache: Option<&[bool]>) {
        if let Some(cache) = filter_cache {
            cluster.edges[edge_index].set_valid(!cache[edge_index]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::model::{PointCloud, Vec3};

    #[test]
    fn filter_marks_removals() {
        let cloud = PointCloud::from_positions(
            (0..4).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect(),
        );
        let mut graph = Graph::new(4);
        graph.insert_edges(&[(0, 1), (1, 2), (2, 3)]);
        graph.build_subgraphs();
        let cluster = Cluster::from_subgraph(&graph, &graph.subgraphs[0], &cloud);

        let cache = vec![false, true, false];
        let op = KeepByFilter;
        for i in 0..cluster.num_edges() {
            op.process_edge(&cluster, i, Some(&cache));
        }
        assert!(cluster.edges[0].is_valid());
        assert!(!cluster.edges[1].is_valid());
        assert!(cluster.edges[2].is_valid());

        // Re-running with the same cache is a no-op
        for i in 0..cluster.num_edges() {
            op.process_edge(&cluster, i, Some(&cache));
        }
        assert!(!cluster.edges[1].is_valid());
    }
}
