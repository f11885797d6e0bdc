use crate::config::{Config, load_config};
use crate::ir::{TileCoord, parse_features};
use crate::layer::LabelLayer;
use crate::projection::WebMercator;
use crate::render::{tiles_with_labels, write_output_svg};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "mlr", version, about = "Collision-free point label tiles")]
pub struct Args {
    /// Features JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output directory; tiles are written as {z}/{x}/{y}.{ext}
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, layer)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Zoom level to render; repeat for several. Defaults to every zoom in range
    #[arg(short = 'z', long = "zoom")]
    pub zoom: Vec<u8>,

    #[arg(long = "minZoom")]
    pub min_zoom: Option<u8>,

    #[arg(long = "maxZoom")]
    pub max_zoom: Option<u8>,

    #[arg(long = "tileSize")]
    pub tile_size: Option<u32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.layer.validate()?;

    let input = read_input(args.input.as_deref())?;
    let features = parse_features(&input)?;
    let output = ensure_output(&args.output)?;

    let mut layer = LabelLayer::new(config.layer.clone(), config.theme.clone());
    layer.set_data(features)?;
    let projection = WebMercator::new(config.layer.tile_size);
    layer.attach(projection)?;
    let Some(index) = layer.index() else {
        return Err(anyhow::anyhow!("Labels were not resolved"));
    };

    let zooms = requested_zooms(&args.zoom, &config);
    let mut written = 0usize;
    for zoom in zooms {
        let tiles = tiles_with_labels(&*index, &projection, zoom, config.layer.tile_size)?;
        for tile in tiles {
            let svg = layer.render_svg_tile(tile)?;
            let path = tile_path(&output, tile, args.output_format);
            match args.output_format {
                OutputFormat::Svg => write_output_svg(&svg, Some(&path))?,
                OutputFormat::Png => write_png(&svg, &path, &config)?,
            }
            written += 1;
        }
    }
    log::info!("wrote {} tiles to {}", written, output.display());
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(min_zoom) = args.min_zoom {
        config.layer.min_zoom = min_zoom;
    }
    if let Some(max_zoom) = args.max_zoom {
        config.layer.max_zoom = max_zoom;
    }
    if let Some(tile_size) = args.tile_size {
        config.layer.tile_size = tile_size;
    }
}

/// Explicit zooms, deduplicated and ascending, or the whole configured range.
fn requested_zooms(explicit: &[u8], config: &Config) -> Vec<u8> {
    if explicit.is_empty() {
        return (config.layer.min_zoom..=config.layer.max_zoom).collect();
    }
    let mut zooms = explicit.to_vec();
    zooms.sort_unstable();
    zooms.dedup();
    zooms
}

fn tile_path(output: &Path, tile: TileCoord, format: OutputFormat) -> PathBuf {
    output
        .join(tile.z.to_string())
        .join(tile.x.to_string())
        .join(format!("{}.{}", tile.y, format.extension()))
}

#[cfg(feature = "png")]
fn write_png(svg: &str, path: &Path, config: &Config) -> Result<()> {
    crate::render::write_output_png(svg, path, &config.theme)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _path: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output directory required for tile output"))
}
