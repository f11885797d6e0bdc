//! Spatial indexes over axis-aligned rectangles.
//!
//! Placement and tile queries only need `insert`, `bulk_load` and `search`,
//! so both the R-tree and the uniform grid below can back either the
//! per-zoom obstacle sets or the final label index.

use rstar::{AABB, RTree, RTreeObject};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build a rect from two arbitrary corners, ordering each axis.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            min_x: a.0.min(b.0),
            min_y: a.1.min(b.1),
            max_x: a.0.max(b.0),
            max_y: a.1.max(b.1),
        }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Closed-interval test: rects that only share an edge intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Open-interval test: true only when the interiors overlap.
    pub fn overlaps_interior(&self, other: &Rect) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Anything with a bounding box in the index's coordinate space.
pub trait Bounded {
    fn bounds(&self) -> Rect;
}

impl Bounded for Rect {
    fn bounds(&self) -> Rect {
        *self
    }
}

pub trait SpatialIndex<T> {
    fn insert(&mut self, item: T);

    fn bulk_load(&mut self, items: Vec<T>);

    /// Items whose bounds intersect `area`, boundary contact included.
    fn search(&self, area: &Rect) -> Vec<&T>;

    fn items(&self) -> Vec<&T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn intersects_any(&self, area: &Rect) -> bool {
        !self.search(area).is_empty()
    }
}

struct Indexed<T> {
    envelope: AABB<[f64; 2]>,
    item: T,
}

impl<T> RTreeObject for Indexed<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn indexed<T: Bounded>(item: T) -> Indexed<T> {
    Indexed {
        envelope: item.bounds().envelope(),
        item,
    }
}

/// R-tree backed index.
pub struct RTreeIndex<T> {
    tree: RTree<Indexed<T>>,
}

impl<T> Default for RTreeIndex<T> {
    fn default() -> Self {
        Self { tree: RTree::new() }
    }
}

impl<T: Bounded> RTreeIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Bounded> SpatialIndex<T> for RTreeIndex<T> {
    fn insert(&mut self, item: T) {
        self.tree.insert(indexed(item));
    }

    fn bulk_load(&mut self, items: Vec<T>) {
        if self.tree.size() == 0 {
            self.tree = RTree::bulk_load(items.into_iter().map(indexed).collect());
            return;
        }
        for item in items {
            self.tree.insert(indexed(item));
        }
    }

    fn search(&self, area: &Rect) -> Vec<&T> {
        self.tree
            .locate_in_envelope_intersecting(&area.envelope())
            .map(|entry| &entry.item)
            .collect()
    }

    fn items(&self) -> Vec<&T> {
        self.tree.iter().map(|entry| &entry.item).collect()
    }

    fn len(&self) -> usize {
        self.tree.size()
    }

    fn intersects_any(&self, area: &Rect) -> bool {
        self.tree
            .locate_in_envelope_intersecting(&area.envelope())
            .next()
            .is_some()
    }
}

const DEFAULT_GRID_CELL: f64 = 48.0;
const MIN_GRID_CELL: f64 = 1e-6;

/// Uniform hash grid. Cheap to build and good when items are roughly the
/// same size as a cell.
pub struct GridIndex<T> {
    cell: f64,
    items: Vec<(Rect, T)>,
    /// Maps grid cell (ix, iy) to indices into `items`.
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl<T> Default for GridIndex<T> {
    fn default() -> Self {
        Self::with_cell_size(DEFAULT_GRID_CELL)
    }
}

impl<T> GridIndex<T> {
    pub fn with_cell_size(cell: f64) -> Self {
        Self {
            cell: cell.max(MIN_GRID_CELL),
            items: Vec::new(),
            cells: HashMap::new(),
        }
    }

    fn cell_range(&self, rect: &Rect) -> (i64, i64, i64, i64) {
        let x0 = (rect.min_x / self.cell).floor() as i64;
        let y0 = (rect.min_y / self.cell).floor() as i64;
        let x1 = (rect.max_x / self.cell).floor() as i64;
        let y1 = (rect.max_y / self.cell).floor() as i64;
        (x0, y0, x1, y1)
    }
}

impl<T: Bounded> SpatialIndex<T> for GridIndex<T> {
    fn insert(&mut self, item: T) {
        let rect = item.bounds();
        let idx = self.items.len();
        let (x0, y0, x1, y1) = self.cell_range(&rect);
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                self.cells.entry((ix, iy)).or_default().push(idx);
            }
        }
        self.items.push((rect, item));
    }

    fn bulk_load(&mut self, items: Vec<T>) {
        self.items.reserve(items.len());
        for item in items {
            self.insert(item);
        }
    }

    fn search(&self, area: &Rect) -> Vec<&T> {
        let (x0, y0, x1, y1) = self.cell_range(area);
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                let Some(bucket) = self.cells.get(&(ix, iy)) else {
                    continue;
                };
                for &idx in bucket {
                    if !seen.insert(idx) {
                        continue;
                    }
                    if self.items[idx].0.intersects(area) {
                        hits.push(idx);
                    }
                }
            }
        }
        // Keep results in insertion order.
        hits.sort_unstable();
        hits.into_iter().map(|idx| &self.items[idx].1).collect()
    }

    fn items(&self) -> Vec<&T> {
        self.items.iter().map(|(_, item)| item).collect()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
