#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod ir;
pub mod label_index;
pub mod layer;
pub mod placement;
pub mod projection;
pub mod render;
pub mod spatial;
pub mod surface;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayerConfig, ZoomRange, load_config};
pub use error::{LabelError, Result};
pub use ir::{LatLng, Point, PointFeature, TileCoord, parse_features, validate_features};
pub use label_index::{LabelEntry, LabelIndex};
pub use layer::{LabelLayer, LayerState, build_label_index};
pub use placement::{Anchor, LabelCandidate, ObstacleSet, Placement, PlacementResolver};
pub use projection::{Projection, WebMercator};
pub use render::render_tile;
pub use spatial::{GridIndex, RTreeIndex, Rect, SpatialIndex};
pub use surface::{DrawingSurface, SvgSurface};
pub use text_metrics::{CharWidthMeasurer, FontMeasurer, FontSpec, TextMeasure};
pub use theme::Theme;
