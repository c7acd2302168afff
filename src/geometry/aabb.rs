use serde::{Deserialize, Serialize};

use crate::model::Vec3;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn empty() -> Self {
        Aabb {
            min: Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Vec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_point(p: Vec3) -> Self {
        Aabb { min: p, max: p }
    }

    pub fn from_segment(a: Vec3, b: Vec3) -> Self {
        Aabb { min: a.min_by_component(b), max: a.max_by_component(b) }
    }

    pub fn from_center_extent(center: Vec3, extent: f64) -> Self {
        let e = Vec3::new(extent, extent, extent);
        Aabb { min: center - e, max: center + e }
    }

    pub fn expanded(self, pad: f64) -> Self {
        let p = Vec3::new(pad, pad, pad);
        Aabb { min: self.min - p, max: self.max + p }
    }

    pub fn include(&mut self, p: Vec3) {
        self.min = self.min.min_by_component(p);
        self.max = self.max.max_by_component(p);
    }

    pub fn union(self, o: Aabb) -> Self {
        Aabb {
            min: self.min.min_by_component(o.min),
            max: self.max.max_by_component(o.max),
        }
    }

    #[inline]
    pub fn center(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn intersects(&self, o: &Aabb) -> bool {
        self.min.x <= o.max.x
            && self.max.x >= o.min.x
            && self.min.y <= o.max.y
            && self.max.y >= o.min.y
            && self.min.z <= o.max.z
            && self.max.z >= o.min.z
    }

    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_box_and_padding() {
        let b = Aabb::from_segment(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 5.0, 0.0));
        assert_eq!(b.min, Vec3::new(-1.0, 2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 5.0, 3.0));
        let p = b.expanded(0.5);
        assert_eq!(p.min, Vec3::new(-1.5, 1.5, -0.5));
        assert!(p.intersects(&Aabb::from_point(Vec3::new(1.4, 5.4, 3.4))));
        assert!(!p.intersects(&Aabb::from_point(Vec3::new(2.0, 0.0, 0.0))));
    }
}
