use thiserror::Error;

/// Errors surfaced during setup and compilation. Per-cluster failures are
/// logged and skipped instead of aborting the whole compile; anything here
/// aborts before work is scheduled.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no refinement selected")]
    NoRefinement,

    #[error("the selected refinement requires heuristics, but none were supplied")]
    HeuristicsRequired,

    #[error("filter chain failed to build: {0}")]
    FilterBuild(String),

    #[error("self-loop edge rejected at node {0}")]
    SelfLoop(u32),

    #[error("graph has not been compiled")]
    NotCompiled,

    #[error("cluster has no nodes or edges")]
    EmptyCluster,
}

pub type Result<T> = std::result::Result<T, Error>;
