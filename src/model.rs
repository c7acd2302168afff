use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::ops::{Add, Mul, Sub};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    #[inline]
    pub fn dot(self, o: Vec3) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    #[inline]
    pub fn length_sq(self) -> f64 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.length_sq().sqrt()
    }

    #[inline]
    pub fn dist_sq(self, o: Vec3) -> f64 {
        (self - o).length_sq()
    }

    #[inline]
    pub fn lerp(self, o: Vec3, t: f64) -> Vec3 {
        self + (o - self) * t
    }

    /// Unit direction towards `o`; zero vector for coincident points.
    pub fn dir_to(self, o: Vec3) -> Vec3 {
        let d = o - self;
        let len = d.length();
        if len <= crate::geometry::tolerance::EPS_LEN {
            Vec3::ZERO
        } else {
            d * (1.0 / len)
        }
    }

    pub fn min_by_component(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x.min(o.x), self.y.min(o.y), self.z.min(o.z))
    }

    pub fn max_by_component(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x.max(o.x), self.y.max(o.y), self.z.max(o.z))
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

// Packed (high, low) u32 pairs; used for adjacency entries and edge keys.
#[inline]
pub fn pack(a: u32, b: u32) -> u64 {
    ((a as u64) << 32) | b as u64
}

#[inline]
pub fn unpack(h: u64) -> (u32, u32) {
    ((h >> 32) as u32, h as u32)
}

/// Order-independent key for an undirected edge.
#[inline]
pub fn edge_key(a: u32, b: u32) -> u64 {
    pack(a.min(b), a.max(b))
}

#[derive(Clone, Debug)]
pub struct Node {
    pub node_index: u32,
    pub point_index: u32,
    /// Packed (other node, edge index) entries, frozen once construction ends.
    pub adjacency: Vec<u64>,
    pub valid: bool,
    pub crossing: bool,
}

impl Node {
    pub fn new(index: u32) -> Self {
        Node {
            node_index: index,
            point_index: index,
            adjacency: Vec::new(),
            valid: false,
            crossing: false,
        }
    }

    pub fn add(&mut self, other: u32, edge: u32) {
        self.adjacency.push(pack(other, edge));
    }
}

/// Undirected edge between two node indices. Only `valid` is mutated once
/// construction ends, always through the atomic.
#[derive(Debug)]
pub struct Edge {
    pub index: u32,
    pub start: u32,
    pub end: u32,
    valid: AtomicBool,
}

impl Edge {
    pub fn new(index: u32, start: u32, end: u32) -> Self {
        Edge { index, start, end, valid: AtomicBool::new(false) }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }

    /// Idempotent under concurrent identical writes.
    #[inline]
    pub fn set_valid(&self, v: bool) {
        self.valid.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn other(&self, node: u32) -> u32 {
        if self.start == node { self.end } else { self.start }
    }

    #[inline]
    pub fn contains(&self, node: u32) -> bool {
        self.start == node || self.end == node
    }

    #[inline]
    pub fn key(&self) -> u64 {
        edge_key(self.start, self.end)
    }
}

impl Clone for Edge {
    fn clone(&self) -> Self {
        Edge {
            index: self.index,
            start: self.start,
            end: self.end,
            valid: AtomicBool::new(self.is_valid()),
        }
    }
}

/// One connected component of a [`Graph`](crate::Graph).
#[derive(Clone, Debug, Default)]
pub struct SubGraph {
    pub id: i64,
    pub nodes: HashSet<u32>,
    pub edges: HashSet<u32>,
    pub consolidated: bool,
}

/// Candidate planarization point between two near-intersecting edges.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EdgeCrossing {
    pub edge_a: u32,
    pub edge_b: u32,
    pub center: Vec3,
}

/// Minimal stand-in for the host point dataset: positions plus optional named
/// scalar attributes (widths, weights, thresholds).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PointCloud {
    pub positions: Vec<Vec3>,
    pub attributes: HashMap<String, Vec<f64>>,
}

impl PointCloud {
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        PointCloud { positions, attributes: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn position(&self, index: u32) -> Vec3 {
        self.positions[index as usize]
    }

    /// Full attribute column, if present.
    pub fn attribute(&self, name: &str) -> Option<&[f64]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Attribute column with a constant fallback. A missing column is a data
    /// error, not a fatal one: it is logged and every row reads `fallback`.
    pub fn attribute_or(&self, name: &str, fallback: f64) -> Cow<'_, [f64]> {
        match self.attributes.get(name) {
            Some(column) => Cow::Borrowed(column.as_slice()),
            None => {
                warn!(attribute = name, fallback, "missing attribute column, using fallback");
                Cow::Owned(vec![fallback; self.len()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_roundtrip() {
        let h = pack(7, 123_456);
        assert_eq!(unpack(h), (7, 123_456));
        assert_eq!(edge_key(9, 2), edge_key(2, 9));
        assert_ne!(edge_key(1, 2), edge_key(1, 3));
    }

    #[test]
    fn missing_attribute_falls_back() {
        let mut cloud = PointCloud::from_positions(vec![Vec3::ZERO, Vec3::ZERO]);
        cloud.attributes.insert("width".into(), vec![1.0, 2.0]);
        assert_eq!(cloud.attribute_or("width", 9.0).as_ref(), &[1.0, 2.0]);
        assert_eq!(cloud.attribute_or("absent", 9.0).as_ref(), &[9.0, 9.0]);
    }

    #[test]
    fn edge_validity_flips() {
        let e = Edge::new(0, 1, 2);
        assert!(!e.is_valid());
        e.set_valid(true);
        assert!(e.is_valid());
        assert_eq!(e.other(1), 2);
        assert_eq!(e.other(2), 1);
    }
}
