// Greedy label placement over per-zoom obstacle indexes.
//
// Every feature, in input order, tries the eight anchors and keeps the one
// that becomes collision free at the lowest zoom. Its footprint is then
// written back into every level where it will be shown, so later features
// see it as an obstacle. Decisions are never revisited.

use crate::config::{LayerConfig, ZoomRange};
use crate::error::{LabelError, Result};
use crate::ir::{LatLng, Point, PointFeature};
use crate::projection::Projection;
use crate::spatial::{RTreeIndex, Rect, SpatialIndex};
use crate::text_metrics::{FontSpec, TextMeasure};
use crate::theme::Theme;

/// Extra footprint at the lowest zoom, relative to the label size.
const MAX_INFLATION: f64 = 1.41;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

impl HAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            HAlign::Left => "left",
            HAlign::Center => "center",
            HAlign::Right => "right",
        }
    }

    fn delta(self, width: f64) -> f64 {
        match self {
            HAlign::Left => 0.0,
            HAlign::Center => -width / 2.0,
            HAlign::Right => -width,
        }
    }
}

/// Vertical alignment of the text box against the anchor point. `Bottom`
/// is the bottom of the glyphs (the ideographic baseline), not the
/// alphabetic baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

impl VAlign {
    pub fn baseline(self) -> &'static str {
        match self {
            VAlign::Top => "top",
            VAlign::Middle => "middle",
            VAlign::Bottom => "ideographic",
        }
    }

    fn delta(self, height: f64) -> f64 {
        match self {
            VAlign::Top => 0.0,
            VAlign::Middle => -height / 2.0,
            VAlign::Bottom => -height,
        }
    }
}

/// Label position relative to its marker, named after the direction of the
/// offset (screen space, `y` down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    East,
    North,
    West,
    NorthEast,
    SouthEast,
    NorthWest,
    South,
    SouthWest,
}

impl Anchor {
    /// Candidates in preference order; earlier wins ties.
    pub const ALL: [Anchor; 8] = [
        Anchor::East,
        Anchor::North,
        Anchor::West,
        Anchor::NorthEast,
        Anchor::SouthEast,
        Anchor::NorthWest,
        Anchor::South,
        Anchor::SouthWest,
    ];

    pub fn h_align(self) -> HAlign {
        match self {
            Anchor::East | Anchor::NorthEast | Anchor::SouthEast => HAlign::Left,
            Anchor::North | Anchor::South => HAlign::Center,
            Anchor::West | Anchor::NorthWest | Anchor::SouthWest => HAlign::Right,
        }
    }

    pub fn v_align(self) -> VAlign {
        match self {
            Anchor::East | Anchor::West => VAlign::Middle,
            Anchor::North | Anchor::NorthEast | Anchor::NorthWest => VAlign::Top,
            Anchor::SouthEast | Anchor::South | Anchor::SouthWest => VAlign::Bottom,
        }
    }

    /// Direction of the offset as a fraction of a full turn.
    pub fn angle_fraction(self) -> f64 {
        match self {
            Anchor::East => 0.0 / 8.0,
            Anchor::SouthEast => 1.0 / 8.0,
            Anchor::South => 2.0 / 8.0,
            Anchor::SouthWest => 3.0 / 8.0,
            Anchor::West => 4.0 / 8.0,
            Anchor::NorthWest => 5.0 / 8.0,
            Anchor::North => 6.0 / 8.0,
            Anchor::NorthEast => 7.0 / 8.0,
        }
    }

    pub fn offset(self, magnitude: f64) -> Point {
        let angle = self.angle_fraction() * 2.0 * std::f64::consts::PI;
        Point::new(magnitude * angle.cos(), magnitude * angle.sin())
    }
}

/// Footprint scale at `zoom`: `1 + 1.41` at the lowest zoom, shrinking
/// linearly to exactly `1` at the highest.
pub fn margin(zoom: u8, range: ZoomRange) -> f64 {
    if range.max <= range.min {
        return 1.0;
    }
    let t = (zoom as f64 - range.min as f64) / (range.max as f64 - range.min as f64);
    1.0 + MAX_INFLATION * (1.0 - t)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelCandidate {
    pub id: String,
    pub position: LatLng,
    pub text: String,
    pub font: FontSpec,
    pub width: f64,
    pub height: f64,
    /// `None` inherits the ambient text color.
    pub fill: Option<String>,
    pub stroke: bool,
    /// Distance between the marker and the label anchor, in pixels.
    pub offset: f64,
}

/// Shared styling used to turn features into label candidates.
#[derive(Debug, Clone)]
pub struct LabelStyle {
    pub font: FontSpec,
    pub line_height: f32,
    pub offset: f64,
    pub fill: Option<String>,
    pub stroke: bool,
}

impl LabelStyle {
    pub fn from_config(config: &LayerConfig, theme: &Theme) -> Self {
        Self {
            font: FontSpec::new(config.font_size, theme.font_family.clone()),
            line_height: config.line_height,
            offset: config.label_offset,
            fill: config.fill.clone(),
            stroke: config.stroke,
        }
    }
}

pub fn prepare_candidates<M: TextMeasure + ?Sized>(
    features: &[PointFeature],
    style: &LabelStyle,
    measurer: &M,
) -> Result<Vec<LabelCandidate>> {
    let height = (style.font.size * style.line_height) as f64;
    features
        .iter()
        .map(|feature| {
            Ok(LabelCandidate {
                id: feature.id.clone(),
                position: feature.position,
                text: feature.name.clone(),
                font: style.font.clone(),
                width: measurer.measure(&style.font, &feature.name)?,
                height,
                fill: style.fill.clone(),
                stroke: style.stroke,
                offset: style.offset,
            })
        })
        .collect()
}

/// Inflated footprint of `candidate` drawn at `anchor` next to the marker at
/// `point` (pixels at `zoom`).
pub fn label_rect(
    point: Point,
    offset: Point,
    anchor: Anchor,
    candidate: &LabelCandidate,
    zoom: u8,
    range: ZoomRange,
) -> Rect {
    let scale = margin(zoom, range);
    anchored_rect(
        point,
        offset,
        anchor,
        candidate.width * scale,
        candidate.height * scale,
    )
}

fn anchored_rect(point: Point, offset: Point, anchor: Anchor, width: f64, height: f64) -> Rect {
    let x = point.x + offset.x + anchor.h_align().delta(width);
    let y = point.y + offset.y + anchor.v_align().delta(height);
    Rect::new(x, y, x + width, y + height)
}

pub fn marker_rect(point: Point, radius: f64) -> Rect {
    Rect::new(
        point.x - radius,
        point.y - radius,
        point.x + radius,
        point.y + radius,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub candidate: LabelCandidate,
    pub anchor: Anchor,
    /// Lowest zoom at which the label is drawn.
    pub min_zoom: u8,
    /// Draw offset from the marker, not inflated.
    pub offset: Point,
}

impl Placement {
    pub fn visible_at(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom
    }

    /// Area the drawn text covers next to the marker at `point`.
    pub fn text_rect(&self, point: Point) -> Rect {
        anchored_rect(
            point,
            self.offset,
            self.anchor,
            self.candidate.width,
            self.candidate.height,
        )
    }

    /// Footprint this placement reserves at `zoom`.
    pub fn footprint<P: Projection + ?Sized>(
        &self,
        projection: &P,
        zoom: u8,
        range: ZoomRange,
    ) -> Result<Rect> {
        let point = projection.project(self.candidate.position, zoom)?;
        Ok(label_rect(
            point,
            self.offset,
            self.anchor,
            &self.candidate,
            zoom,
            range,
        ))
    }
}

/// One obstacle index per zoom level of the range.
pub struct ObstacleSet<I = RTreeIndex<Rect>> {
    range: ZoomRange,
    levels: Vec<I>,
}

impl<I: SpatialIndex<Rect> + Default> ObstacleSet<I> {
    pub fn new(range: ZoomRange) -> Self {
        let levels = (0..range.len()).map(|_| I::default()).collect();
        Self { range, levels }
    }

    /// Fresh set pre-loaded with a square footprint for every marker.
    pub fn with_markers<P: Projection + ?Sized>(
        range: ZoomRange,
        positions: impl Iterator<Item = LatLng> + Clone,
        projection: &P,
        radius: f64,
    ) -> Result<Self> {
        let mut set = Self::new(range);
        for zoom in range.descending() {
            let rects = positions
                .clone()
                .map(|position| Ok(marker_rect(projection.project(position, zoom)?, radius)))
                .collect::<Result<Vec<_>>>()?;
            if let Some(level) = set.level_mut(zoom) {
                level.bulk_load(rects);
            }
        }
        Ok(set)
    }
}

impl<I: SpatialIndex<Rect>> ObstacleSet<I> {
    pub fn range(&self) -> ZoomRange {
        self.range
    }

    /// Obstacles at `zoom`, or `None` outside the range.
    pub fn level(&self, zoom: u8) -> Option<&I> {
        let slot = self.slot(zoom)?;
        self.levels.get(slot)
    }

    fn level_mut(&mut self, zoom: u8) -> Option<&mut I> {
        let slot = self.slot(zoom)?;
        self.levels.get_mut(slot)
    }

    fn slot(&self, zoom: u8) -> Option<usize> {
        self.range
            .contains(zoom)
            .then(|| (zoom - self.range.min) as usize)
    }

    /// Nothing is placed outside the range, so nothing collides there.
    pub fn collides(&self, zoom: u8, rect: &Rect) -> bool {
        self.level(zoom)
            .is_some_and(|level| level.intersects_any(rect))
    }

    pub fn insert(&mut self, zoom: u8, rect: Rect) -> Result<()> {
        let range = self.range;
        let level = self.level_mut(zoom).ok_or(LabelError::ZoomOutOfRange {
            zoom,
            min: range.min,
            max: range.max,
        })?;
        level.insert(rect);
        Ok(())
    }
}

/// Ordered allocator: each call claims space for one candidate against
/// everything claimed before it.
pub struct PlacementResolver<'a, I, P: ?Sized> {
    obstacles: &'a mut ObstacleSet<I>,
    projection: &'a P,
}

impl<'a, I: SpatialIndex<Rect>, P: Projection + ?Sized> PlacementResolver<'a, I, P> {
    pub fn new(obstacles: &'a mut ObstacleSet<I>, projection: &'a P) -> Self {
        Self {
            obstacles,
            projection,
        }
    }

    /// Lowest zoom at which `anchor` stays collision free all the way up to
    /// the top of the range. `range.max + 1` means never.
    fn usable_zoom(&self, candidate: &LabelCandidate, points: &[Point], anchor: Anchor) -> u16 {
        let range = self.obstacles.range();
        let offset = anchor.offset(candidate.offset);
        for zoom in range.descending() {
            let point = points[(zoom - range.min) as usize];
            let rect = label_rect(point, offset, anchor, candidate, zoom, range);
            if self.obstacles.collides(zoom, &rect) {
                return zoom as u16 + 1;
            }
        }
        range.min as u16
    }

    pub fn place(&mut self, candidate: LabelCandidate) -> Result<Option<Placement>> {
        let range = self.obstacles.range();
        let points = (range.min..=range.max)
            .map(|zoom| self.projection.project(candidate.position, zoom))
            .collect::<Result<Vec<_>>>()?;

        let mut best: Option<(Anchor, u16)> = None;
        for anchor in Anchor::ALL {
            let zoom = self.usable_zoom(&candidate, &points, anchor);
            if zoom > range.max as u16 {
                continue;
            }
            if best.is_none_or(|(_, best_zoom)| zoom < best_zoom) {
                best = Some((anchor, zoom));
            }
        }

        let Some((anchor, min_zoom)) = best else {
            log::debug!("dropping label {:?}: no free anchor at any zoom", candidate.id);
            return Ok(None);
        };
        let min_zoom = min_zoom as u8;
        let offset = anchor.offset(candidate.offset);
        for zoom in (min_zoom..=range.max).rev() {
            let point = points[(zoom - range.min) as usize];
            let rect = label_rect(point, offset, anchor, &candidate, zoom, range);
            self.obstacles.insert(zoom, rect)?;
        }

        Ok(Some(Placement {
            candidate,
            anchor,
            min_zoom,
            offset,
        }))
    }
}

/// Place candidates in order. Features that fit nowhere are left out.
pub fn resolve_placements<I, P>(
    candidates: Vec<LabelCandidate>,
    obstacles: &mut ObstacleSet<I>,
    projection: &P,
) -> Result<Vec<Placement>>
where
    I: SpatialIndex<Rect>,
    P: Projection + ?Sized,
{
    let mut resolver = PlacementResolver::new(obstacles, projection);
    let mut placements = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if let Some(placement) = resolver.place(candidate)? {
            placements.push(placement);
        }
    }
    Ok(placements)
}
