use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cluster::Cluster;
use crate::heuristics::Heuristics;
use crate::model::unpack;

/// Global minimum-spanning-tree reduction (Prim). Edges start invalid; the
/// tree edges chosen under the supplied cost handler are validated. Runs as
/// one sequential pass over the cluster — the decision for one edge depends
/// on every other, so it cannot be chunked.
#[derive(Clone, Copy, Debug, Default)]
pub struct MstReduce;

struct Candidate {
    cost: f64,
    edge: u32,
    node: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so the max-heap pops the cheapest candidate; edge index
    // breaks ties deterministically.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.edge.cmp(&self.edge))
    }
}

impl MstReduce {
    pub fn process(&self, cluster: &Cluster, heuristics: &dyn Heuristics) {
        let n = cluster.num_nodes();
        if n == 0 {
            return;
        }

        let mut in_tree = vec![false; n];
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();

        let mut grow = |node: u32, heap: &mut BinaryHeap<Candidate>, in_tree: &mut Vec<bool>| {
            in_tree[node as usize] = true;
            for &packed in &cluster.nodes[node as usize].adjacency {
                let (other, edge) = unpack(packed);
                if in_tree[other as usize] {
                    continue;
                }
                heap.push(Candidate {
                    cost: heuristics.cost(cluster.position(node), cluster.position(other)),
                    edge,
                    node: other,
                });
            }
        };

        grow(0, &mut heap, &mut in_tree);
        while let Some(candidate) = heap.pop() {
            if in_tree[candidate.node as usize] {
                continue;
            }
            cluster.edges[candidate.edge as usize].set_valid(true);
            grow(candidate.node, &mut heap, &mut in_tree);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::heuristics::DistanceHeuristics;
    use crate::model::{PointCloud, Vec3};

    #[test]
    fn tree_has_node_count_minus_one_edges() {
        let cloud = PointCloud::from_positions(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]);
        let mut graph = Graph::new(4);
        // Square with both diagonals
        graph.insert_edges(&[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2), (1, 3)]);
        graph.build_subgraphs();
        let cluster = Cluster::from_subgraph(&graph, &graph.subgraphs[0], &cloud);

        for e in &cluster.edges {
            e.set_valid(false);
        }
        MstReduce.process(&cluster, &DistanceHeuristics);

        let kept: Vec<_> = cluster.edges.iter().filter(|e| e.is_valid()).collect();
        assert_eq!(kept.len(), 3);
        // The long diagonals can never be in a Euclidean MST of a square
        for e in kept {
            assert!(cluster.expanded_edges()[e.index as usize].length_sq < 1.5);
        }
    }
}
