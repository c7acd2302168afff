use super::aabb::Aabb;
use crate::model::Vec3;

const MAX_LEAF_ITEMS: usize = 16;
const MAX_DEPTH: u32 = 10;

/// Static octree over indexed bounding boxes. Built once before parallel
/// dispatch, read-only afterwards; point octrees use zero-extent boxes.
///
/// Items are kept in the deepest cell that fully contains them, so queries
/// never report the same index twice.
#[derive(Debug)]
pub struct Octree {
    item_bounds: Vec<Aabb>,
    root: Cell,
}

#[derive(Debug)]
struct Cell {
    bounds: Aabb,
    items: Vec<u32>,
    children: Option<Box<[Cell; 8]>>,
}

impl Cell {
    fn new(bounds: Aabb) -> Self {
        Cell { bounds, items: Vec::new(), children: None }
    }

    fn octant_bounds(&self, i: usize) -> Aabb {
        let c = self.bounds.center();
        let (min, max) = (self.bounds.min, self.bounds.max);
        let x = if i & 1 == 0 { (min.x, c.x) } else { (c.x, max.x) };
        let y = if i & 2 == 0 { (min.y, c.y) } else { (c.y, max.y) };
        let z = if i & 4 == 0 { (min.z, c.z) } else { (c.z, max.z) };
        Aabb { min: Vec3::new(x.0, y.0, z.0), max: Vec3::new(x.1, y.1, z.1) }
    }

    fn insert(&mut self, index: u32, bounds: &[Aabb], depth: u32) {
        let slot = cell_child_index(&self.bounds, &bounds[index as usize]);
        if let Some(children) = self.children.as_mut() {
            if let Some(i) = slot {
                children[i].insert(index, bounds, depth + 1);
            } else {
                self.items.push(index);
            }
            return;
        }

        self.items.push(index);
        if self.items.len() > MAX_LEAF_ITEMS && depth < MAX_DEPTH {
            self.split(bounds, depth);
        }
    }

    fn split(&mut self, bounds: &[Aabb], depth: u32) {
        let mut children: Box<[Cell; 8]> =
            Box::new(std::array::from_fn(|i| Cell::new(self.octant_bounds(i))));

        let items = std::mem::take(&mut self.items);
        for index in items {
            match cell_child_index(&self.bounds, &bounds[index as usize]) {
                Some(i) => children[i].insert(index, bounds, depth + 1),
                None => self.items.push(index),
            }
        }
        self.children = Some(children);
    }

    /// Returns false when the visitor stopped the search.
    fn find_first(
        &self,
        query: &Aabb,
        bounds: &[Aabb],
        visit: &mut impl FnMut(u32) -> bool,
    ) -> bool {
        if !self.bounds.intersects(query) {
            return true;
        }
        for &index in &self.items {
            if bounds[index as usize].intersects(query) && !visit(index) {
                return false;
            }
        }
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                if !child.find_first(query, bounds, visit) {
                    return false;
                }
            }
        }
        true
    }
}

fn cell_child_index(cell: &Aabb, b: &Aabb) -> Option<usize> {
    let c = cell.center();
    let ix = if b.max.x <= c.x { 0 } else if b.min.x >= c.x { 1 } else { return None };
    let iy = if b.max.y <= c.y { 0 } else if b.min.y >= c.y { 2 } else { return None };
    let iz = if b.max.z <= c.z { 0 } else if b.min.z >= c.z { 4 } else { return None };
    Some(ix | iy | iz)
}

impl Octree {
    pub fn build(item_bounds: Vec<Aabb>) -> Self {
        let mut root_bounds = Aabb::empty();
        for b in &item_bounds {
            root_bounds = root_bounds.union(*b);
        }
        if item_bounds.is_empty() {
            root_bounds = Aabb::from_point(Vec3::ZERO);
        }
        // A hair of padding so items on the hull are strictly contained
        root_bounds = root_bounds.expanded(1e-9);

        let mut root = Cell::new(root_bounds);
        for i in 0..item_bounds.len() {
            root.insert(i as u32, &item_bounds, 0);
        }
        Octree { item_bounds, root }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        Self::build(points.into_iter().map(Aabb::from_point).collect())
    }

    pub fn len(&self) -> usize {
        self.item_bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_bounds.is_empty()
    }

    /// Visits item indices whose bounds overlap `query` until the visitor
    /// returns false. Early-exit counterpart to [`for_each_overlapping`].
    ///
    /// [`for_each_overlapping`]: Octree::for_each_overlapping
    pub fn find_first(&self, query: &Aabb, mut visit: impl FnMut(u32) -> bool) {
        self.root.find_first(query, &self.item_bounds, &mut visit);
    }

    pub fn for_each_overlapping(&self, query: &Aabb, mut visit: impl FnMut(u32)) {
        self.root.find_first(query, &self.item_bounds, &mut |i| {
            visit(i);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_points_in_range() {
        let points: Vec<Vec3> = (0..100)
            .map(|i| Vec3::new(i as f64, (i % 10) as f64, 0.0))
            .collect();
        let tree = Octree::from_points(points.clone());

        let query = Aabb::from_center_extent(Vec3::new(50.0, 5.0, 0.0), 3.0);
        let mut found = Vec::new();
        tree.for_each_overlapping(&query, |i| found.push(i));

        let expected: Vec<u32> = (0..100u32)
            .filter(|&i| query.contains_point(points[i as usize]))
            .collect();
        let mut found_sorted = found.clone();
        found_sorted.sort_unstable();
        assert_eq!(found_sorted, expected);
        assert_eq!(found.len(), found_sorted.len(), "no duplicates");
    }

    #[test]
    fn early_exit_stops_search() {
        let tree = Octree::from_points((0..1000).map(|i| Vec3::new(i as f64, 0.0, 0.0)));
        let query = Aabb::from_center_extent(Vec3::new(500.0, 0.0, 0.0), 100.0);
        let mut visits = 0;
        tree.find_first(&query, |_| {
            visits += 1;
            false
        });
        assert_eq!(visits, 1);
    }

    #[test]
    fn spanning_boxes_are_reported_once() {
        let mut bounds: Vec<Aabb> = (0..64)
            .map(|i| {
                let p = Vec3::new((i % 8) as f64, (i / 8) as f64, 0.0);
                Aabb::from_segment(p, p + Vec3::new(0.5, 0.5, 0.0))
            })
            .collect();
        // One segment spanning the whole extent
        bounds.push(Aabb::from_segment(Vec3::ZERO, Vec3::new(8.0, 8.0, 0.0)));
        let tree = Octree::build(bounds);

        let query = Aabb::from_center_extent(Vec3::new(4.0, 4.0, 0.0), 10.0);
        let mut seen = std::collections::HashSet::new();
        tree.for_each_overlapping(&query, |i| {
            assert!(seen.insert(i), "duplicate item {i}");
        });
        assert_eq!(seen.len(), 65);
    }
}
