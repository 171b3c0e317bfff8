//! Uniform-grid 2D spatial index used by sensors and weapon-range queries. Cells
//! are keyed by `(floor(x/cell), floor(y/cell))`; a query only visits the cells
//! overlapping the expanded bounding box of the search radius.

use crate::id::Id;
use ahash::AHashMap;

pub const DEFAULT_CELL_SIZE_MKM: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Point2 { x, y }
    }

    #[must_use]
    pub fn distance_to(self, other: Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone)]
pub struct SpatialIndex2D {
    cell_size: f64,
    ids: Vec<Id>,
    positions: Vec<Point2>,
    cells: AHashMap<(i64, i64), Vec<usize>>,
}

impl SpatialIndex2D {
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        SpatialIndex2D {
            cell_size: if cell_size > 0.0 {
                cell_size
            } else {
                DEFAULT_CELL_SIZE_MKM
            },
            ids: Vec::new(),
            positions: Vec::new(),
            cells: AHashMap::new(),
        }
    }

    fn cell_of(&self, p: Point2) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    pub fn add(&mut self, id: Id, pos: Point2) {
        let idx = self.ids.len();
        self.ids.push(id);
        self.positions.push(pos);
        self.cells.entry(self.cell_of(pos)).or_default().push(idx);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.positions.clear();
        self.cells.clear();
    }

    /// Returns ids within `radius + eps` of `center`, sorted ascending and deduped.
    #[must_use]
    pub fn query_radius(&self, center: Point2, radius: f64, eps: f64) -> Vec<Id> {
        let r = radius + eps;
        if r <= 0.0 {
            return Vec::new();
        }
        let cell_min = self.cell_of(Point2::new(center.x - r, center.y - r));
        let cell_max = self.cell_of(Point2::new(center.x + r, center.y + r));
        let mut found = Vec::new();
        for cx in cell_min.0..=cell_max.0 {
            for cy in cell_min.1..=cell_max.1 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    for &idx in bucket {
                        let d = self.positions[idx].distance_to(center);
                        if d <= r {
                            found.push(self.ids[idx]);
                        }
                    }
                }
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for SpatialIndex2D {
    fn default() -> Self {
        SpatialIndex2D::new(DEFAULT_CELL_SIZE_MKM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matches_scenario_s5_positive_coords() {
        let mut idx = SpatialIndex2D::new(10.0);
        idx.add(Id(3), Point2::new(20.0, 0.0));
        idx.add(Id(1), Point2::new(0.0, 0.0));
        idx.add(Id(2), Point2::new(9.9, 0.0));
        let hits = idx.query_radius(Point2::new(0.0, 0.0), 10.0, 1e-9);
        assert_eq!(hits, vec![Id(1), Id(2)]);
    }

    #[test]
    fn query_matches_scenario_s5_negative_coords() {
        let mut idx = SpatialIndex2D::new(10.0);
        idx.add(Id(1), Point2::new(-0.1, -0.1));
        idx.add(Id(2), Point2::new(-9.9, -9.9));
        idx.add(Id(3), Point2::new(-20.0, 0.0));
        let hits = idx.query_radius(Point2::new(0.0, 0.0), 15.0, 1e-9);
        assert_eq!(hits, vec![Id(1), Id(2)]);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = SpatialIndex2D::default();
        assert!(idx.query_radius(Point2::new(0.0, 0.0), 100.0, 0.0).is_empty());
    }

    #[test]
    fn results_are_deduplicated() {
        let mut idx = SpatialIndex2D::new(5.0);
        idx.add(Id(1), Point2::new(0.0, 0.0));
        idx.add(Id(1), Point2::new(0.1, 0.1));
        let hits = idx.query_radius(Point2::new(0.0, 0.0), 1.0, 0.0);
        assert_eq!(hits, vec![Id(1)]);
    }
}
