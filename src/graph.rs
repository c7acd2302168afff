use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};
use crate::model::{edge_key, unpack, Edge, Node, SubGraph};

/// Simple undirected graph over a fixed node range. Nodes are created
/// up-front (one per source point); edges are deduplicated through their
/// canonical key. Topology is frozen once refinement begins; from then on
/// only edge validity flags change.
#[derive(Debug, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    unique_edges: HashMap<u64, u32>,
    pub subgraphs: Vec<SubGraph>,
    node_remap: Vec<Option<u32>>,
}

impl Graph {
    pub fn new(num_nodes: usize) -> Self {
        Graph {
            nodes: (0..num_nodes as u32).map(Node::new).collect(),
            edges: Vec::new(),
            unique_edges: HashMap::new(),
            subgraphs: Vec::new(),
            node_remap: Vec::new(),
        }
    }

    /// Inserts the undirected edge (a, b). Self-loops are rejected; inserting
    /// an existing pair returns the existing edge index. The new edge and
    /// both endpoints are validated.
    pub fn insert_edge(&mut self, a: u32, b: u32) -> Result<u32> {
        if a == b {
            return Err(Error::SelfLoop(a));
        }
        debug_assert!((a as usize) < self.nodes.len() && (b as usize) < self.nodes.len());

        let key = edge_key(a, b);
        if let Some(&existing) = self.unique_edges.get(&key) {
            return Ok(existing);
        }

        let index = self.edges.len() as u32;
        let edge = Edge::new(index, a, b);
        edge.set_valid(true);
        self.edges.push(edge);
        self.unique_edges.insert(key, index);

        self.nodes[a as usize].add(b, index);
        self.nodes[b as usize].add(a, index);
        self.nodes[a as usize].valid = true;
        self.nodes[b as usize].valid = true;

        Ok(index)
    }

    /// Bulk insertion; self-loops in the batch are skipped.
    pub fn insert_edges(&mut self, batch: &[(u32, u32)]) {
        for &(a, b) in batch {
            let _ = self.insert_edge(a, b);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Appends a node backed by `point_index`, flagged as crossing-derived.
    /// Nodes at or past the original count are planarization vertices.
    pub fn add_crossing_node(&mut self, point_index: u32) -> u32 {
        let index = self.nodes.len() as u32;
        let mut node = Node::new(index);
        node.point_index = point_index;
        node.crossing = true;
        self.nodes.push(node);
        index
    }

    /// Partitions valid nodes into connected components. Recomputed from
    /// scratch; never patched incrementally.
    pub fn build_subgraphs(&mut self) {
        self.subgraphs.clear();

        let mut assigned = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();

        for seed in 0..self.nodes.len() {
            if assigned[seed] || !self.nodes[seed].valid {
                continue;
            }

            let mut sub = SubGraph { id: self.subgraphs.len() as i64, ..Default::default() };
            assigned[seed] = true;
            queue.push_back(seed as u32);

            while let Some(current) = queue.pop_front() {
                sub.nodes.insert(current);
                for &packed in &self.nodes[current as usize].adjacency {
                    let (other, edge) = unpack(packed);
                    if !self.edges[edge as usize].is_valid() {
                        continue;
                    }
                    sub.edges.insert(edge);
                    if !assigned[other as usize] && self.nodes[other as usize].valid {
                        assigned[other as usize] = true;
                        queue.push_back(other);
                    }
                }
            }

            self.subgraphs.push(sub);
        }
    }

    /// Drops subgraphs whose node count falls outside `[min, max]` when
    /// pruning, invalidating their nodes and edges. Surviving subgraphs are
    /// left untouched.
    pub fn consolidate(&mut self, prune: bool, min: usize, max: usize) {
        if !prune {
            for sub in &mut self.subgraphs {
                sub.consolidated = true;
            }
            return;
        }

        let mut kept = Vec::with_capacity(self.subgraphs.len());
        for mut sub in std::mem::take(&mut self.subgraphs) {
            let count = sub.nodes.len();
            if count < min || count > max {
                for &e in &sub.edges {
                    self.edges[e as usize].set_valid(false);
                }
                for &n in &sub.nodes {
                    self.nodes[n as usize].valid = false;
                }
                continue;
            }
            sub.consolidated = true;
            kept.push(sub);
        }
        self.subgraphs = kept;
    }

    /// Remaps surviving node indices to a dense contiguous range for output.
    /// Unmapped nodes are excluded from any later write.
    pub fn consolidate_indices(&mut self, prune: bool) -> &[Option<u32>] {
        self.node_remap.clear();
        self.node_remap.resize(self.nodes.len(), None);

        let mut next = 0u32;
        for node in &self.nodes {
            if prune && !node.valid {
                continue;
            }
            self.node_remap[node.node_index as usize] = Some(next);
            next += 1;
        }
        &self.node_remap
    }

    pub fn remapped_index(&self, node: u32) -> Option<u32> {
        self.node_remap.get(node as usize).copied().flatten()
    }

    /// Iterates non-empty subgraphs.
    pub fn for_each_cluster(&self, mut f: impl FnMut(&SubGraph)) {
        for sub in &self.subgraphs {
            if sub.nodes.is_empty() || sub.edges.is_empty() {
                continue;
            }
            f(sub);
        }
    }
}
