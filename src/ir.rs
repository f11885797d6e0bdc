use crate::error::{LabelError, Result};
use serde::{Deserialize, Serialize};

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Pixel position at some zoom level. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub id: String,
    pub position: LatLng,
    #[serde(default)]
    pub name: String,
}

impl PointFeature {
    pub fn new(id: impl Into<String>, position: LatLng, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position,
            name: name.into(),
        }
    }
}

/// Tile grid coordinate. `x`/`y` count tiles from the top-left of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn origin(&self, tile_size: u32) -> Point {
        let size = tile_size as f64;
        Point::new(self.x as f64 * size, self.y as f64 * size)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureFile {
    List(Vec<PointFeature>),
    Wrapped { nodes: Vec<PointFeature> },
}

/// Parse a feature list from JSON. Accepts either a bare array or an object
/// with a `nodes` array. Input order is preserved since it decides placement
/// priority.
pub fn parse_features(input: &str) -> Result<Vec<PointFeature>> {
    let parsed: FeatureFile = serde_json::from_str(input)?;
    let features = match parsed {
        FeatureFile::List(features) => features,
        FeatureFile::Wrapped { nodes } => nodes,
    };
    validate_features(&features)?;
    Ok(features)
}

/// Reject features whose position cannot be projected.
pub fn validate_features(features: &[PointFeature]) -> Result<()> {
    match features.iter().find(|feature| !feature.position.is_finite()) {
        Some(feature) => Err(LabelError::InvalidPosition {
            id: feature.id.clone(),
            lat: feature.position.lat,
            lng: feature.position.lng,
        }),
        None => Ok(()),
    }
}
