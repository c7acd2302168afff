use crate::model::Vec3;

/// Cost handler for weight-dependent refinements (MST reduction). Costs only
/// ever compare against each other, so any monotonic scale works.
pub trait Heuristics: Send + Sync {
    fn cost(&self, from: Vec3, to: Vec3) -> f64;
}

/// Plain Euclidean edge weight.
pub struct DistanceHeuristics;

impl Heuristics for DistanceHeuristics {
    fn cost(&self, from: Vec3, to: Vec3) -> f64 {
        from.dist_sq(to)
    }
}

/// Penalizes climbing along `up`: flat edges are cheap, vertical ones cost
/// up to `weight` extra per unit of distance.
pub struct SteepnessHeuristics {
    pub up: Vec3,
    pub weight: f64,
}

impl SteepnessHeuristics {
    pub fn new(weight: f64) -> Self {
        SteepnessHeuristics { up: Vec3::new(0.0, 0.0, 1.0), weight }
    }
}

impl Heuristics for SteepnessHeuristics {
    fn cost(&self, from: Vec3, to: Vec3) -> f64 {
        let dist = (to - from).length();
        let steepness = from.dir_to(to).dot(self.up).abs();
        dist * (1.0 + steepness * self.weight)
    }
}
