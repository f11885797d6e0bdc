use crate::config::LayerConfig;
use crate::error::Result;
use crate::ir::{Point, TileCoord};
use crate::label_index::{LabelEntry, LabelIndex};
use crate::placement::Placement;
use crate::projection::Projection;
use crate::spatial::{Rect, SpatialIndex};
use crate::surface::DrawingSurface;
use crate::theme::{Theme, halo_color};
use std::collections::BTreeSet;
use std::path::Path;

/// Geographic box (`x = lng`, `y = lat`) covering `tile` grown by `margin`
/// pixels on every side.
pub fn tile_bounds<P: Projection + ?Sized>(
    projection: &P,
    tile: TileCoord,
    tile_size: u32,
    margin: f64,
) -> Result<Rect> {
    let origin = tile.origin(tile_size);
    let size = tile_size as f64;
    let top_left = projection.unproject(Point::new(origin.x - margin, origin.y - margin), tile.z)?;
    let bottom_right = projection.unproject(
        Point::new(origin.x + size + margin, origin.y + size + margin),
        tile.z,
    )?;
    // Latitude decreases as pixel y grows, so the corners swap on that axis.
    Ok(Rect::from_corners(
        (top_left.lng, top_left.lat),
        (bottom_right.lng, bottom_right.lat),
    ))
}

/// Draw every label visible in `tile` onto `surface`. Returns the number of
/// labels drawn. Reads the index only; tiles can be rendered in any order.
pub fn render_tile<I, P, S>(
    index: &LabelIndex<I>,
    projection: &P,
    tile: TileCoord,
    config: &LayerConfig,
    theme: &Theme,
    surface: &mut S,
) -> Result<usize>
where
    I: SpatialIndex<LabelEntry>,
    P: Projection + ?Sized,
    S: DrawingSurface + ?Sized,
{
    let origin = tile.origin(config.tile_size);
    let area = tile_bounds(projection, tile, config.tile_size, index.render_margin())?;

    let mut visible: Vec<(Point, &Placement)> = Vec::new();
    for entry in index.query(&area) {
        let placement = &entry.placement;
        if !placement.visible_at(tile.z) || placement.candidate.text.is_empty() {
            continue;
        }
        let p = projection.project(entry.anchor, tile.z)?;
        visible.push((Point::new(p.x - origin.x, p.y - origin.y), placement));
    }

    surface.set_line_width(config.halo_width);
    surface.set_stroke_style(&halo_color(&theme.background, config.halo_alpha));
    surface.set_miter_limit(config.halo_miter_limit);

    for (local, placement) in &visible {
        draw_label(surface, *local, placement, theme);
    }
    Ok(visible.len())
}

fn draw_label<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    local: Point,
    placement: &Placement,
    theme: &Theme,
) {
    let label = &placement.candidate;
    let x = local.x + placement.offset.x;
    let y = local.y + placement.offset.y;
    surface.set_font(&label.font);
    surface.set_text_align(placement.anchor.h_align());
    surface.set_text_baseline(placement.anchor.v_align());
    surface.set_fill_style(label.fill.as_deref().unwrap_or(&theme.text_color));
    if label.stroke {
        surface.stroke_text(&label.text, x, y);
    }
    surface.fill_text(&label.text, x, y);
}

/// Tiles at `zoom` that show at least part of a visible label.
pub fn tiles_with_labels<I, P>(
    index: &LabelIndex<I>,
    projection: &P,
    zoom: u8,
    tile_size: u32,
) -> Result<BTreeSet<TileCoord>>
where
    I: SpatialIndex<LabelEntry>,
    P: Projection + ?Sized,
{
    let size = tile_size as f64;
    let last = (1i64 << zoom.min(62)) - 1;
    let mut tiles = BTreeSet::new();
    for entry in index.entries() {
        let placement = &entry.placement;
        if !placement.visible_at(zoom) || placement.candidate.text.is_empty() {
            continue;
        }
        let point = projection.project(entry.anchor, zoom)?;
        let rect = placement.text_rect(point);
        let x0 = ((rect.min_x / size).floor() as i64).clamp(0, last);
        let x1 = ((rect.max_x / size).floor() as i64).clamp(0, last);
        let y0 = ((rect.min_y / size).floor() as i64).clamp(0, last);
        let y1 = ((rect.max_y / size).floor() as i64).clamp(0, last);
        for x in x0..=x1 {
            for y in y0..=y1 {
                tiles.insert(TileCoord::new(x, y, zoom));
            }
        }
    }
    Ok(tiles)
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, theme: &Theme) -> anyhow::Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme.font_family.clone();
    let mut fontdb = usvg::fontdb::Database::new();
    fontdb.load_system_fonts();
    opt.fontdb = std::sync::Arc::new(fontdb);

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::LatLng;
    use crate::placement::{Anchor, HAlign, LabelCandidate, VAlign};
    use crate::projection::WebMercator;
    use crate::surface::SvgSurface;
    use crate::text_metrics::FontSpec;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Font(String),
        Align(HAlign),
        Baseline(VAlign),
        Fill(String),
        Stroke(String),
        LineWidth(f32),
        MiterLimit(f32),
        StrokeText(String, f64, f64),
        FillText(String, f64, f64),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl Recorder {
        fn filled(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::FillText(text, _, _) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl DrawingSurface for Recorder {
        fn set_font(&mut self, font: &FontSpec) {
            self.calls.push(Call::Font(font.css()));
        }
        fn set_text_align(&mut self, align: HAlign) {
            self.calls.push(Call::Align(align));
        }
        fn set_text_baseline(&mut self, baseline: VAlign) {
            self.calls.push(Call::Baseline(baseline));
        }
        fn set_fill_style(&mut self, color: &str) {
            self.calls.push(Call::Fill(color.to_string()));
        }
        fn set_stroke_style(&mut self, color: &str) {
            self.calls.push(Call::Stroke(color.to_string()));
        }
        fn set_line_width(&mut self, width: f32) {
            self.calls.push(Call::LineWidth(width));
        }
        fn set_miter_limit(&mut self, limit: f32) {
            self.calls.push(Call::MiterLimit(limit));
        }
        fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
            self.calls.push(Call::StrokeText(text.to_string(), x, y));
        }
        fn fill_text(&mut self, text: &str, x: f64, y: f64) {
            self.calls.push(Call::FillText(text.to_string(), x, y));
        }
    }

    fn placement(text: &str, position: LatLng, min_zoom: u8) -> Placement {
        Placement {
            candidate: LabelCandidate {
                id: text.to_string(),
                position,
                text: text.to_string(),
                font: FontSpec::new(11.0, "sans-serif"),
                width: 40.0,
                height: 13.2,
                fill: None,
                stroke: true,
                offset: 8.0,
            },
            anchor: Anchor::East,
            min_zoom,
            offset: Anchor::East.offset(8.0),
        }
    }

    fn tile_containing(projection: &WebMercator, position: LatLng, zoom: u8) -> TileCoord {
        let p = projection.project(position, zoom).unwrap();
        TileCoord::new((p.x / 256.0).floor() as i64, (p.y / 256.0).floor() as i64, zoom)
    }

    #[test]
    fn tile_bounds_are_normalized() {
        let projection = WebMercator::default();
        let rect = tile_bounds(&projection, TileCoord::new(0, 0, 1), 256, 0.0).unwrap();
        assert!(rect.min_x < rect.max_x);
        assert!(rect.min_y < rect.max_y);
        assert!((rect.min_x + 180.0).abs() < 1e-9);
        assert!(rect.max_x.abs() < 1e-9);
        assert!(rect.min_y.abs() < 1e-9);
    }

    #[test]
    fn renders_label_in_its_tile_with_halo_first() {
        let projection = WebMercator::default();
        let position = LatLng::new(40.0, -3.0);
        let index = LabelIndex::build(vec![placement("Madrid", position, 3)]);
        let tile = tile_containing(&projection, position, 6);
        let mut recorder = Recorder::default();
        let drawn = render_tile(
            &index,
            &projection,
            tile,
            &LayerConfig::default(),
            &Theme::light(),
            &mut recorder,
        )
        .unwrap();
        assert_eq!(drawn, 1);

        let origin = tile.origin(256);
        let p = projection.project(position, 6).unwrap();
        let (x, y) = (p.x - origin.x + 8.0, p.y - origin.y);
        assert_eq!(
            recorder.calls,
            vec![
                Call::LineWidth(5.0),
                Call::Stroke("rgba(255,255,255,0.7)".to_string()),
                Call::MiterLimit(2.0),
                Call::Font("11px sans-serif".to_string()),
                Call::Align(HAlign::Left),
                Call::Baseline(VAlign::Middle),
                Call::Fill("#333333".to_string()),
                Call::StrokeText("Madrid".to_string(), x, y),
                Call::FillText("Madrid".to_string(), x, y),
            ]
        );
    }

    #[test]
    fn hidden_below_min_zoom() {
        let projection = WebMercator::default();
        let position = LatLng::new(40.0, -3.0);
        let index = LabelIndex::build(vec![placement("Madrid", position, 7)]);
        let config = LayerConfig::default();
        let theme = Theme::light();
        for zoom in [5u8, 6, 7, 8] {
            let mut recorder = Recorder::default();
            let tile = tile_containing(&projection, position, zoom);
            let drawn =
                render_tile(&index, &projection, tile, &config, &theme, &mut recorder).unwrap();
            assert_eq!(drawn, usize::from(zoom >= 7), "zoom {zoom}");
        }
    }

    #[test]
    fn skips_empty_text_and_uses_custom_fill() {
        let projection = WebMercator::default();
        let position = LatLng::new(0.0, 0.0);
        let mut styled = placement("Styled", LatLng::new(0.01, 0.01), 0);
        styled.candidate.fill = Some("#FF0000".to_string());
        styled.candidate.stroke = false;
        let index = LabelIndex::build(vec![placement("", position, 0), styled]);
        let mut recorder = Recorder::default();
        let tile = tile_containing(&projection, position, 4);
        render_tile(
            &index,
            &projection,
            tile,
            &LayerConfig::default(),
            &Theme::dark(),
            &mut recorder,
        )
        .unwrap();
        assert_eq!(recorder.filled(), vec!["Styled"]);
        assert!(recorder.calls.contains(&Call::Fill("#FF0000".to_string())));
        assert!(
            !recorder
                .calls
                .iter()
                .any(|call| matches!(call, Call::StrokeText(..)))
        );
    }

    #[test]
    fn label_spilling_over_edge_is_drawn_in_neighbour() {
        let projection = WebMercator::default();
        // Anchored just left of the tile seam at zoom 1, text runs into tile x = 1.
        let position = projection.unproject(Point::new(250.0, 100.0), 1).unwrap();
        let index = LabelIndex::build(vec![placement("Seam", position, 0)]);
        let mut recorder = Recorder::default();
        let drawn = render_tile(
            &index,
            &projection,
            TileCoord::new(1, 0, 1),
            &LayerConfig::default(),
            &Theme::light(),
            &mut recorder,
        )
        .unwrap();
        assert_eq!(drawn, 1);
        match recorder.calls.last() {
            Some(Call::FillText(_, x, _)) => assert!((*x - 2.0).abs() < 1e-6),
            other => panic!("unexpected last call {other:?}"),
        }
    }

    #[test]
    fn far_away_labels_are_not_queried() {
        let projection = WebMercator::default();
        let index = LabelIndex::build(vec![placement("Far", LatLng::new(-40.0, 150.0), 0)]);
        let mut surface = SvgSurface::new(256);
        let drawn = render_tile(
            &index,
            &projection,
            TileCoord::new(0, 0, 3),
            &LayerConfig::default(),
            &Theme::light(),
            &mut surface,
        )
        .unwrap();
        assert_eq!(drawn, 0);
        assert_eq!(surface.draw_count(), 0);
    }

    #[test]
    fn lists_tiles_covered_by_visible_labels() {
        let projection = WebMercator::default();
        // Text spans pixels 248..288, across the seam at 256.
        let position = projection.unproject(Point::new(240.0, 100.0), 1).unwrap();
        let index = LabelIndex::build(vec![
            placement("Seam", position, 0),
            placement("Later", LatLng::new(-60.0, -170.0), 5),
        ]);
        let tiles = tiles_with_labels(&index, &projection, 1, 256).unwrap();
        let expected: BTreeSet<TileCoord> = [TileCoord::new(0, 0, 1), TileCoord::new(1, 0, 1)]
            .into_iter()
            .collect();
        assert_eq!(tiles, expected);
    }
}
