use crate::error::{LabelError, Result};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerConfig {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
    /// Distance in pixels between the marker center and the label anchor.
    pub label_offset: f64,
    /// Half the side of the square each marker occupies at every zoom.
    pub marker_radius: f64,
    pub font_size: f32,
    pub line_height: f32,
    pub stroke: bool,
    /// Label fill color. `None` uses the theme's text color.
    pub fill: Option<String>,
    pub halo_width: f32,
    pub halo_alpha: f32,
    pub halo_miter_limit: f32,
    /// Estimate widths from a character table instead of loading fonts.
    pub fast_text_metrics: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 18,
            tile_size: 256,
            label_offset: 8.0,
            marker_radius: 4.0,
            font_size: 11.0,
            line_height: 1.2,
            stroke: true,
            fill: None,
            halo_width: 5.0,
            halo_alpha: 0.7,
            halo_miter_limit: 2.0,
            fast_text_metrics: false,
        }
    }
}

impl LayerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_zoom > self.max_zoom {
            return Err(LabelError::InvalidZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if self.tile_size == 0 {
            return Err(LabelError::InvalidTileSize);
        }
        Ok(())
    }

    pub fn zoom_range(&self) -> ZoomRange {
        ZoomRange::new(self.min_zoom, self.max_zoom)
    }
}

/// Inclusive range of integer zoom levels the layer resolves placements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, zoom: u8) -> bool {
        (self.min..=self.max).contains(&zoom)
    }

    /// Levels from `max` down to `min`.
    pub fn descending(&self) -> impl Iterator<Item = u8> {
        (self.min..=self.max).rev()
    }

    pub fn len(&self) -> usize {
        (self.max as usize + 1).saturating_sub(self.min as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layer: LayerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    background: Option<String>,
    text_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layer: Option<LayerConfig>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    match parsed.theme.as_deref() {
        Some("dark") => config.theme = Theme::dark(),
        Some("light") | Some("default") => config.theme = Theme::light(),
        Some(other) => log::warn!("unknown theme {other:?}, keeping the default"),
        None => {}
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
    }

    if let Some(layer) = parsed.layer {
        config.layer = layer;
    }
    config.layer.validate()?;
    Ok(config)
}
