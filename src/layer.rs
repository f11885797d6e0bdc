use crate::config::LayerConfig;
use crate::error::{LabelError, Result};
use crate::ir::{PointFeature, TileCoord, validate_features};
use crate::label_index::LabelIndex;
use crate::placement::{LabelStyle, ObstacleSet, prepare_candidates, resolve_placements};
use crate::projection::Projection;
use crate::render::render_tile;
use crate::surface::{DrawingSurface, SvgSurface};
use crate::text_metrics::{CharWidthMeasurer, FontMeasurer, TextMeasure};
use crate::theme::Theme;
use std::sync::Arc;

/// Whether tiles can currently be drawn.
#[derive(Clone)]
pub enum LayerState {
    Unresolved,
    Resolved(Arc<LabelIndex>),
}

impl LayerState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, LayerState::Resolved(_))
    }
}

/// Run one full resolution pass: measure, load marker obstacles, place
/// labels in input order and index the survivors.
pub fn build_label_index<P, M>(
    features: &[PointFeature],
    config: &LayerConfig,
    theme: &Theme,
    projection: &P,
    measurer: &M,
) -> Result<LabelIndex>
where
    P: Projection + ?Sized,
    M: TextMeasure + ?Sized,
{
    config.validate()?;
    validate_features(features)?;
    let range = config.zoom_range();
    let style = LabelStyle::from_config(config, theme);
    let candidates = prepare_candidates(features, &style, measurer)?;
    let mut obstacles: ObstacleSet = ObstacleSet::with_markers(
        range,
        features.iter().map(|feature| feature.position),
        projection,
        config.marker_radius,
    )?;
    let placements = resolve_placements(candidates, &mut obstacles, projection)?;
    let index = LabelIndex::build(placements);
    log::info!(
        "placed {} of {} labels for zooms {}..={} (render margin {:.1}px)",
        index.len(),
        features.len(),
        range.min,
        range.max,
        index.render_margin()
    );
    Ok(index)
}

/// Host-facing label layer. Placement runs once per dataset, when both data
/// and a projection are available; tiles are then drawn from the published
/// index until the data changes.
pub struct LabelLayer<P> {
    config: LayerConfig,
    theme: Theme,
    measurer: Box<dyn TextMeasure + Send + Sync>,
    projection: Option<P>,
    features: Option<Vec<PointFeature>>,
    state: LayerState,
}

impl<P: Projection> LabelLayer<P> {
    pub fn new(config: LayerConfig, theme: Theme) -> Self {
        let measurer: Box<dyn TextMeasure + Send + Sync> = if config.fast_text_metrics {
            Box::new(CharWidthMeasurer)
        } else {
            Box::new(FontMeasurer)
        };
        Self::with_measurer(config, theme, measurer)
    }

    pub fn with_measurer(
        config: LayerConfig,
        theme: Theme,
        measurer: Box<dyn TextMeasure + Send + Sync>,
    ) -> Self {
        Self {
            config,
            theme,
            measurer,
            projection: None,
            features: None,
            state: LayerState::Unresolved,
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn state(&self) -> &LayerState {
        &self.state
    }

    pub fn projection(&self) -> Option<&P> {
        self.projection.as_ref()
    }

    /// Snapshot of the published index, if any.
    pub fn index(&self) -> Option<Arc<LabelIndex>> {
        match &self.state {
            LayerState::Resolved(index) => Some(Arc::clone(index)),
            LayerState::Unresolved => None,
        }
    }

    /// Replace the dataset. Resolves right away when attached; on failure the
    /// previous dataset and index stay in place and the error is returned.
    pub fn set_data(&mut self, features: Vec<PointFeature>) -> Result<()> {
        if let Some(projection) = &self.projection {
            let index = self.resolve(&features, projection)?;
            self.state = LayerState::Resolved(Arc::new(index));
        } else {
            self.state = LayerState::Unresolved;
        }
        self.features = Some(features);
        Ok(())
    }

    /// Attach to a map. Resolves if data is present and not yet resolved.
    /// The projection must use the configured tile size, since tile origins
    /// are computed from it.
    pub fn attach(&mut self, projection: P) -> Result<()> {
        if projection.tile_size() != self.config.tile_size {
            return Err(LabelError::TileSizeMismatch {
                config: self.config.tile_size,
                projection: projection.tile_size(),
            });
        }
        if let Some(features) = &self.features
            && !self.state.is_resolved()
        {
            let index = self.resolve(features, &projection)?;
            self.state = LayerState::Resolved(Arc::new(index));
        }
        self.projection = Some(projection);
        Ok(())
    }

    fn resolve(&self, features: &[PointFeature], projection: &P) -> Result<LabelIndex> {
        build_label_index(
            features,
            &self.config,
            &self.theme,
            projection,
            self.measurer.as_ref(),
        )
    }

    /// Draw `tile` onto `surface`. Draws nothing until resolved.
    pub fn render_tile<S: DrawingSurface + ?Sized>(
        &self,
        tile: TileCoord,
        surface: &mut S,
    ) -> Result<usize> {
        let (LayerState::Resolved(index), Some(projection)) = (&self.state, &self.projection)
        else {
            return Ok(0);
        };
        render_tile(
            index.as_ref(),
            projection,
            tile,
            &self.config,
            &self.theme,
            surface,
        )
    }

    pub fn render_svg_tile(&self, tile: TileCoord) -> Result<String> {
        let mut surface = SvgSurface::new(self.config.tile_size);
        self.render_tile(tile, &mut surface)?;
        Ok(surface.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LabelError;
    use crate::ir::{LatLng, Point};
    use crate::projection::WebMercator;
    use crate::text_metrics::FontSpec;

    fn config() -> LayerConfig {
        LayerConfig {
            min_zoom: 0,
            max_zoom: 10,
            fast_text_metrics: true,
            ..Default::default()
        }
    }

    fn features() -> Vec<PointFeature> {
        vec![
            PointFeature::new("1", LatLng::new(52.52, 13.40), "Berlin"),
            PointFeature::new("2", LatLng::new(48.14, 11.58), "Munich"),
        ]
    }

    struct FailingMeasurer;

    impl TextMeasure for FailingMeasurer {
        fn measure(&self, font: &FontSpec, text: &str) -> Result<f64> {
            Err(LabelError::Measure {
                font: font.css(),
                text: text.to_string(),
            })
        }
    }

    #[test]
    fn unresolved_layer_renders_empty_tiles() {
        let mut layer: LabelLayer<WebMercator> = LabelLayer::new(config(), Theme::light());
        layer.set_data(features()).unwrap();
        assert!(!layer.state().is_resolved());
        let mut surface = SvgSurface::new(256);
        assert_eq!(layer.render_tile(TileCoord::new(0, 0, 0), &mut surface).unwrap(), 0);
        assert_eq!(surface.draw_count(), 0);
    }

    #[test]
    fn attach_resolves_pending_data() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.set_data(features()).unwrap();
        layer.attach(WebMercator::default()).unwrap();
        let index = layer.index().expect("resolved");
        assert_eq!(index.len(), 2);
        let svg = layer.render_svg_tile(TileCoord::new(0, 0, 0)).unwrap();
        assert!(svg.contains(">Berlin</text>"));
        assert!(svg.contains(">Munich</text>"));
    }

    #[test]
    fn attach_without_data_stays_unresolved() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.attach(WebMercator::default()).unwrap();
        assert!(layer.index().is_none());
    }

    #[test]
    fn set_data_after_attach_rebuilds_from_scratch() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.attach(WebMercator::default()).unwrap();
        layer.set_data(features()).unwrap();
        let first = layer.index().unwrap();
        layer
            .set_data(vec![PointFeature::new("3", LatLng::new(0.0, 0.0), "Null Island")])
            .unwrap();
        let second = layer.index().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn empty_dataset_resolves_to_empty_index() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.attach(WebMercator::default()).unwrap();
        layer.set_data(Vec::new()).unwrap();
        let index = layer.index().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.render_margin(), 16.0);
        let mut surface = SvgSurface::new(256);
        for zoom in 0..=3u8 {
            let drawn = layer.render_tile(TileCoord::new(0, 0, zoom), &mut surface).unwrap();
            assert_eq!(drawn, 0);
        }
    }

    #[test]
    fn failed_rebuild_keeps_previous_index() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.attach(WebMercator::default()).unwrap();
        layer.set_data(features()).unwrap();
        let before = layer.index().unwrap();

        layer.measurer = Box::new(FailingMeasurer);
        let err = layer.set_data(vec![PointFeature::new("x", LatLng::new(1.0, 1.0), "X")]);
        assert!(matches!(err, Err(LabelError::Measure { .. })));
        let after = layer.index().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn failed_rebuild_keeps_previous_dataset() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.attach(WebMercator::default()).unwrap();
        layer.set_data(features()).unwrap();

        layer.measurer = Box::new(FailingMeasurer);
        assert!(layer.set_data(vec![PointFeature::new("x", LatLng::new(1.0, 1.0), "X")]).is_err());
        assert_eq!(layer.features.as_ref().map(Vec::len), Some(2));
        assert!(layer.state().is_resolved());
    }

    #[test]
    fn attach_rejects_mismatched_tile_size() {
        let large = LayerConfig {
            tile_size: 512,
            ..config()
        };
        let mut layer = LabelLayer::new(large, Theme::light());
        layer.set_data(features()).unwrap();
        assert!(matches!(
            layer.attach(WebMercator::default()),
            Err(LabelError::TileSizeMismatch {
                config: 512,
                projection: 256
            })
        ));
        assert!(layer.projection().is_none());
        assert!(layer.index().is_none());

        layer.attach(WebMercator::new(512)).unwrap();
        let munich = layer
            .projection()
            .unwrap()
            .project(LatLng::new(48.14, 11.58), 4)
            .unwrap();
        let tile = TileCoord::new(
            (munich.x / 512.0).floor() as i64,
            (munich.y / 512.0).floor() as i64,
            4,
        );
        let svg = layer.render_svg_tile(tile).unwrap();
        assert!(svg.contains(">Munich</text>"));
    }

    #[test]
    fn non_finite_feature_fails_resolution() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.attach(WebMercator::default()).unwrap();
        let err = layer.set_data(vec![PointFeature::new("nan", LatLng::new(f64::NAN, 0.0), "Nowhere")]);
        assert!(matches!(err, Err(LabelError::InvalidPosition { .. })));
        assert!(layer.index().is_none());
    }

    #[test]
    fn invalid_config_fails_resolution() {
        let bad = LayerConfig {
            min_zoom: 5,
            max_zoom: 1,
            ..config()
        };
        let mut layer = LabelLayer::new(bad, Theme::light());
        layer.set_data(features()).unwrap();
        assert!(layer.attach(WebMercator::default()).is_err());
        assert!(layer.index().is_none());
    }

    #[test]
    fn index_snapshot_outlives_layer_changes() {
        let mut layer = LabelLayer::new(config(), Theme::light());
        layer.attach(WebMercator::default()).unwrap();
        layer.set_data(features()).unwrap();
        let snapshot = layer.index().unwrap();
        layer.set_data(Vec::new()).unwrap();
        let hits = snapshot.query(&crate::spatial::Rect::new(-180.0, -90.0, 180.0, 90.0));
        assert_eq!(hits.len(), 2);
        let berlin = layer
            .projection()
            .unwrap()
            .project(LatLng::new(52.52, 13.40), 3)
            .unwrap();
        assert!(berlin.x > Point::default().x);
    }
}
