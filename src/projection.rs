//! Geographic ↔ pixel conversion.

use crate::error::{LabelError, Result};
use crate::ir::{LatLng, Point};
use std::f64::consts::PI;

/// Converts between geographic coordinates and world pixel coordinates at an
/// integer zoom level. Implementations must round-trip within floating-point
/// tolerance for every zoom the layer is configured for.
pub trait Projection {
    fn project(&self, position: LatLng, zoom: u8) -> Result<Point>;
    fn unproject(&self, point: Point, zoom: u8) -> Result<LatLng>;

    /// Pixel size of one tile; the world is `tile_size * 2^zoom` wide.
    fn tile_size(&self) -> u32;
}

/// Spherical Mercator as used by slippy-map tile servers.
#[derive(Debug, Clone, Copy)]
pub struct WebMercator {
    tile_size: u32,
}

const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

impl WebMercator {
    pub fn new(tile_size: u32) -> Self {
        Self { tile_size }
    }

    fn scale(&self, zoom: u8) -> Result<f64> {
        if zoom > 30 {
            return Err(LabelError::Projection {
                zoom,
                reason: "zoom level out of range".to_string(),
            });
        }
        Ok(self.tile_size as f64 * 2f64.powi(zoom as i32))
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Projection for WebMercator {
    fn project(&self, position: LatLng, zoom: u8) -> Result<Point> {
        let scale = self.scale(zoom)?;
        let lat = position.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (position.lng + 180.0) / 360.0;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
        Ok(Point::new(x * scale, y * scale))
    }

    fn unproject(&self, point: Point, zoom: u8) -> Result<LatLng> {
        let scale = self.scale(zoom)?;
        let lng = point.x / scale * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * point.y / scale);
        let lat = n.sinh().atan().to_degrees();
        Ok(LatLng::new(lat, lng))
    }

    fn tile_size(&self) -> u32 {
        self.tile_size
    }
}
