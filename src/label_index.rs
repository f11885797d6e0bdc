use crate::ir::LatLng;
use crate::placement::Placement;
use crate::spatial::{Bounded, RTreeIndex, Rect, SpatialIndex};

/// Slack added around every tile query on top of the widest label.
const BASE_RENDER_MARGIN: f64 = 16.0;

#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub anchor: LatLng,
    pub placement: Placement,
    /// Position in placement order; tiles draw in this order.
    pub order: usize,
}

impl Bounded for LabelEntry {
    fn bounds(&self) -> Rect {
        Rect::point(self.anchor.lng, self.anchor.lat)
    }
}

/// Resolved labels keyed by their geographic anchor (`x = lng`, `y = lat`).
/// Built once per resolution pass and read-only afterwards.
pub struct LabelIndex<I = RTreeIndex<LabelEntry>> {
    entries: I,
    render_margin: f64,
}

impl LabelIndex {
    pub fn build(placements: Vec<Placement>) -> Self {
        Self::build_with(RTreeIndex::new(), placements)
    }

    pub fn empty() -> Self {
        Self::build(Vec::new())
    }
}

impl<I: SpatialIndex<LabelEntry>> LabelIndex<I> {
    pub fn build_with(mut entries: I, placements: Vec<Placement>) -> Self {
        let render_margin = render_margin(&placements);
        let items = placements
            .into_iter()
            .enumerate()
            .map(|(order, placement)| LabelEntry {
                anchor: placement.candidate.position,
                placement,
                order,
            })
            .collect();
        entries.bulk_load(items);
        Self {
            entries,
            render_margin,
        }
    }

    /// Pixels a tile query is grown by on every side, so labels anchored in
    /// a neighbouring tile still get drawn where they spill over.
    pub fn render_margin(&self) -> f64 {
        self.render_margin
    }

    /// Entries anchored inside `area`, in placement order.
    pub fn query(&self, area: &Rect) -> Vec<&LabelEntry> {
        let mut hits = self.entries.search(area);
        hits.sort_by_key(|entry| entry.order);
        hits
    }

    /// Every entry, in placement order.
    pub fn entries(&self) -> Vec<&LabelEntry> {
        let mut all = self.entries.items();
        all.sort_by_key(|entry| entry.order);
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn render_margin(placements: &[Placement]) -> f64 {
    placements
        .iter()
        .map(|placement| placement.candidate.width)
        .reduce(f64::max)
        .map_or(BASE_RENDER_MARGIN, |widest| BASE_RENDER_MARGIN + widest)
}
