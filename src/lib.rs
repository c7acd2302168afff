pub mod error;
pub mod model;
pub mod geometry {
    pub mod aabb;
    pub mod math;
    pub mod octree;
    pub mod tolerance;
}
pub mod graph;
pub mod crossings;
pub mod cluster;
pub mod refine {
    pub mod gabriel;
    pub mod keep_by_filter;
    pub mod mst;
    pub mod overlap;

    mod operation;
    pub use operation::Refinement;
}
pub mod builder;
pub mod filters;
pub mod heuristics;
pub mod process;

pub use builder::{GraphBuilder, GraphOutput};
pub use cluster::Cluster;
pub use crossings::EdgeCrossingsHandler;
pub use error::{Error, Result};
pub use graph::Graph;
pub use model::{Edge, EdgeCrossing, Node, PointCloud, SubGraph, Vec3};
pub use process::{ClusterProcessor, RefinePass, RefineSettings, Sanitization};
pub use refine::Refinement;
