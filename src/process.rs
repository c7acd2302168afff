use std::ops::Range;

use rayon::prelude::*;
use tracing::warn;

use crate::builder::GraphBuilder;
use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::filters::FilterChain;
use crate::graph::Graph;
use crate::heuristics::Heuristics;
use crate::model::{unpack, PointCloud};
use crate::refine::Refinement;

/// Post-refinement degree repair. `Longest`/`Shortest` revalidate one
/// extremal edge per node so no surviving node is left isolated; `Filters`
/// revalidates edges matched by a dedicated chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sanitization {
    #[default]
    None,
    Longest,
    Shortest,
    Filters,
}

#[derive(Clone, Copy, Debug)]
pub struct RefineSettings {
    pub chunk_size: usize,
    pub sanitization: Sanitization,
}

impl Default for RefineSettings {
    fn default() -> Self {
        RefineSettings { chunk_size: 256, sanitization: Sanitization::None }
    }
}

/// Splits `0..len` into contiguous chunks and runs them on the rayon pool.
/// Returns only once every chunk has finished, so each call is a barrier
/// between phases.
fn parallel_ranges(len: usize, chunk_size: usize, op: impl Fn(Range<usize>) + Send + Sync) {
    if len == 0 {
        return;
    }
    let chunk_size = chunk_size.max(1);
    let starts: Vec<usize> = (0..len).step_by(chunk_size).collect();
    starts
        .into_par_iter()
        .for_each(|start| op(start..(start + chunk_size).min(len)));
}

/// Runs one refinement over one cluster: filter evaluation, validity reset,
/// algorithm dispatch, then sanitization. Filter chains are tested against
/// source-graph edge indices, so one chain serves every cluster of a graph.
pub struct ClusterProcessor<'a> {
    pub cluster: &'a Cluster,
    pub refinement: &'a Refinement,
    pub heuristics: Option<&'a dyn Heuristics>,
    pub edge_filters: Option<&'a FilterChain>,
    pub sanitize_filters: Option<&'a FilterChain>,
    pub settings: RefineSettings,
}

impl ClusterProcessor<'_> {
    /// Returns the source-graph indices of surviving edges, in edge order.
    pub fn process(&self) -> Result<Vec<u32>> {
        let cluster = self.cluster;
        let num_edges = cluster.num_edges();
        if cluster.num_nodes() == 0 || num_edges == 0 {
            return Err(Error::EmptyCluster);
        }
        if self.refinement.requires_heuristics() && self.heuristics.is_none() {
            return Err(Error::HeuristicsRequired);
        }

        // Warm the shared caches before any parallel phase touches them.
        cluster.expanded_edges();
        if self.refinement.wants_node_octree() {
            cluster.node_octree();
        }
        if self.refinement.requires_edge_octree() {
            cluster.edge_octree();
        }

        let filter_cache: Option<Vec<bool>> = match self.edge_filters {
            Some(chain) if self.refinement.supports_filters() && !chain.is_empty() => Some(
                (0..num_edges)
                    .into_par_iter()
                    .map(|i| chain.test(cluster.edges[i].source as usize))
                    .collect(),
            ),
            _ => None,
        };

        let default_validity = self.refinement.default_edge_validity();
        parallel_ranges(num_edges, self.settings.chunk_size, |range| {
            for i in range {
                cluster.edges[i].set_valid(default_validity);
            }
        });

        if self.refinement.individual_edge_processing() {
            let cache = filter_cache.as_deref();
            parallel_ranges(num_edges, self.settings.chunk_size, |range| {
                for i in range {
                    self.refinement.process_edge(cluster, i, cache);
                }
            });
        } else if self.refinement.individual_node_processing() {
            parallel_ranges(cluster.num_nodes(), self.settings.chunk_size, |range| {
                for i in range {
                    self.refinement.process_node(cluster, i);
                }
            });
        } else {
            self.refinement.process(cluster, self.heuristics);
        }

        match self.settings.sanitization {
            Sanitization::None => {}
            Sanitization::Longest => self.sanitize_extremal(true),
            Sanitization::Shortest => self.sanitize_extremal(false),
            Sanitization::Filters => {
                if let Some(chain) = self.sanitize_filters {
                    if !chain.is_empty() {
                        parallel_ranges(num_edges, self.settings.chunk_size, |range| {
                            for i in range {
                                if chain.test(cluster.edges[i].source as usize) {
                                    cluster.edges[i].set_valid(true);
                                }
                            }
                        });
                    }
                }
            }
        }

        Ok(cluster.valid_edges())
    }

    /// Per node, revalidates the longest (or shortest) incident edge,
    /// regardless of what the refinement left valid. Every node with any
    /// incident edge ends with degree >= 1; stores are idempotent so
    /// concurrent repair of shared edges is safe.
    fn sanitize_extremal(&self, longest: bool) {
        let cluster = self.cluster;
        parallel_ranges(cluster.num_nodes(), self.settings.chunk_size, |range| {
            for n in range {
                let node = &cluster.nodes[n];
                let mut best: Option<u32> = None;
                let mut best_dist = if longest { f64::NEG_INFINITY } else { f64::INFINITY };
                for &packed in &node.adjacency {
                    let (other, edge) = unpack(packed);
                    let d = cluster.dist_sq(node.index, other);
                    let better = if longest { d > best_dist } else { d < best_dist };
                    if better {
                        best_dist = d;
                        best = Some(edge);
                    }
                }
                if let Some(edge) = best {
                    cluster.edges[edge as usize].set_valid(true);
                }
            }
        });
    }
}

/// One refinement configuration, applied to every cluster of a compiled
/// graph. Clusters run concurrently; a cluster that fails is skipped with a
/// warning rather than aborting its siblings.
pub struct RefinePass<'a> {
    refinement: &'a Refinement,
    heuristics: Option<&'a dyn Heuristics>,
    edge_filters: Option<&'a FilterChain>,
    sanitize_filters: Option<&'a FilterChain>,
    settings: RefineSettings,
}

impl<'a> RefinePass<'a> {
    pub fn new(refinement: Option<&'a Refinement>, settings: RefineSettings) -> Result<Self> {
        let refinement = refinement.ok_or(Error::NoRefinement)?;
        Ok(RefinePass {
            refinement,
            heuristics: None,
            edge_filters: None,
            sanitize_filters: None,
            settings,
        })
    }

    pub fn with_heuristics(mut self, heuristics: &'a dyn Heuristics) -> Self {
        self.heuristics = Some(heuristics);
        self
    }

    pub fn with_edge_filters(mut self, filters: &'a FilterChain) -> Self {
        self.edge_filters = Some(filters);
        self
    }

    pub fn with_sanitize_filters(mut self, filters: &'a FilterChain) -> Self {
        self.sanitize_filters = Some(filters);
        self
    }

    /// Setup-time validation, before any cluster work is scheduled.
    pub fn validate(&self) -> Result<()> {
        if self.refinement.requires_heuristics() && self.heuristics.is_none() {
            return Err(Error::HeuristicsRequired);
        }
        Ok(())
    }

    pub fn processor(&self, cluster: &'a Cluster) -> ClusterProcessor<'a> {
        ClusterProcessor {
            cluster,
            refinement: self.refinement,
            heuristics: self.heuristics,
            edge_filters: self.edge_filters,
            sanitize_filters: self.sanitize_filters,
            settings: self.settings,
        }
    }

    /// Refines every cluster of `graph`. Surviving edges are returned per
    /// cluster as source-graph edge indices and, when `merge_into` is given,
    /// re-inserted into that builder as point-index pairs.
    pub fn run(
        &self,
        graph: &Graph,
        cloud: &PointCloud,
        merge_into: Option<&GraphBuilder>,
    ) -> Result<Vec<Vec<u32>>> {
        self.validate()?;

        let mut clusters = Vec::new();
        graph.for_each_cluster(|sub| {
            clusters.push((sub.id, Cluster::from_subgraph(graph, sub, cloud)));
        });

        let survivors: Vec<Vec<u32>> = clusters
            .par_iter()
            .map(|(id, cluster)| match self.processor(cluster).process() {
                Ok(edges) => edges,
                Err(err) => {
                    warn!(subgraph = *id, %err, "cluster refinement skipped");
                    Vec::new()
                }
            })
            .collect();

        if let Some(builder) = merge_into {
            for surviving in &survivors {
                let pairs: Vec<(u32, u32)> = surviving
                    .iter()
                    .map(|&e| {
                        let edge = &graph.edges[e as usize];
                        (
                            graph.nodes[edge.start as usize].point_index,
                            graph.nodes[edge.end as usize].point_index,
                        )
                    })
                    .collect();
                builder.insert_edges(&pairs);
            }
        }

        Ok(survivors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::DistanceHeuristics;
    use crate::model::Vec3;
    use crate::refine::mst::MstReduce;
    use crate::refine::keep_by_filter::KeepByFilter;

    fn path_cluster(n: usize) -> (Graph, PointCloud) {
        let cloud = PointCloud::from_positions(
            (0..n).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect(),
        );
        let mut graph = Graph::new(n);
        let edges: Vec<(u32, u32)> = (0..n as u32 - 1).map(|i| (i, i + 1)).collect();
        graph.insert_edges(&edges);
        graph.build_subgraphs();
        (graph, cloud)
    }

    #[test]
    fn missing_refinement_is_a_setup_error() {
        assert!(matches!(
            RefinePass::new(None, RefineSettings::default()),
            Err(Error::NoRefinement)
        ));
    }

    #[test]
    fn mst_without_heuristics_is_a_setup_error() {
        let (graph, cloud) = path_cluster(3);
        let refinement = Refinement::MstReduce(MstReduce);
        let cluster = Cluster::from_subgraph(&graph, &graph.subgraphs[0], &cloud);
        let processor = ClusterProcessor {
            cluster: &cluster,
            refinement: &refinement,
            heuristics: None,
            edge_filters: None,
            sanitize_filters: None,
            settings: RefineSettings::default(),
        };
        assert!(matches!(processor.process(), Err(Error::HeuristicsRequired)));
    }

    #[test]
    fn mst_pass_keeps_a_spanning_tree() {
        let (graph, cloud) = path_cluster(5);
        let refinement = Refinement::MstReduce(MstReduce);
        let heuristics = DistanceHeuristics;
        let pass = RefinePass::new(Some(&refinement), RefineSettings::default())
            .unwrap()
            .with_heuristics(&heuristics);
        let survivors = pass.run(&graph, &cloud, None).unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].len(), 4);
    }

    #[test]
    fn filter_pass_with_sanitization_repairs_degree() {
        // Drop every edge, then Longest sanitization must leave each node
        // with at least one incident survivor.
        let (graph, cloud) = path_cluster(6);
        let refinement = Refinement::KeepByFilter(KeepByFilter);
        let chain = FilterChain::new().with(|_i: usize| true);
        let settings = RefineSettings { sanitization: Sanitization::Longest, chunk_size: 2 };
        let pass = RefinePass::new(Some(&refinement), settings)
            .unwrap()
            .with_edge_filters(&chain);

        let cluster = Cluster::from_subgraph(&graph, &graph.subgraphs[0], &cloud);
        let surviving = pass.processor(&cluster).process().unwrap();
        assert!(!surviving.is_empty());
        for node in &cluster.nodes {
            let degree = node
                .adjacency
                .iter()
                .filter(|&&p| cluster.edges[unpack(p).1 as usize].is_valid())
                .count();
            assert!(degree >= 1, "node {} left isolated", node.index);
        }
    }

    #[test]
    fn longest_sanitization_revalidates_connected_nodes_too() {
        // Path 0-1-2-3 with a long middle edge. The filter drops only that
        // edge, so both its endpoints keep a short valid edge; the middle
        // edge is still their longest and must come back.
        let cloud = PointCloud::from_positions(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(6.0, 0.0, 0.0),
        ]);
        let mut graph = Graph::new(4);
        graph.insert_edges(&[(0, 1), (1, 2), (2, 3)]);
        graph.build_subgraphs();
        let cluster = Cluster::from_subgraph(&graph, &graph.subgraphs[0], &cloud);

        let refinement = Refinement::KeepByFilter(KeepByFilter);
        let chain = FilterChain::new().with(|i: usize| i == 1);
        let settings = RefineSettings { sanitization: Sanitization::Longest, ..Default::default() };
        ClusterProcessor {
            cluster: &cluster,
            refinement: &refinement,
            heuristics: None,
            edge_filters: Some(&chain),
            sanitize_filters: None,
            settings,
        }
        .process()
        .unwrap();

        assert!(cluster.edges[0].is_valid());
        assert!(cluster.edges[2].is_valid());
        assert!(
            cluster.edges[1].is_valid(),
            "longest incident edge of nodes 1 and 2 must be revalidated"
        );
    }

    #[test]
    fn refined_edges_merge_into_a_builder() {
        let (graph, mut cloud) = path_cluster(4);
        let refinement = Refinement::MstReduce(MstReduce);
        let heuristics = DistanceHeuristics;
        let pass = RefinePass::new(Some(&refinement), RefineSettings::default())
            .unwrap()
            .with_heuristics(&heuristics);

        let mut builder = GraphBuilder::new(cloud.len());
        pass.run(&graph, &cloud, Some(&builder)).unwrap();
        builder.compile(&mut cloud, 1, usize::MAX).unwrap();
        let out = builder.write(&cloud).unwrap();
        assert_eq!(out.clusters.len(), 1);
        assert_eq!(out.clusters[0].edges.len(), 3);
    }
}
