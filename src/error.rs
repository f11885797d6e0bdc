use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("invalid zoom range: min zoom {min} is greater than max zoom {max}")]
    InvalidZoomRange { min: u8, max: u8 },

    #[error("tile size must be positive")]
    InvalidTileSize,

    #[error("projection tile size {projection} does not match configured tile size {config}")]
    TileSizeMismatch { config: u32, projection: u32 },

    #[error("zoom {zoom} is outside the placement range {min}..={max}")]
    ZoomOutOfRange { zoom: u8, min: u8, max: u8 },

    #[error("failed to measure text {text:?} with font {font}")]
    Measure { font: String, text: String },

    #[error("projection failed at zoom {zoom}: {reason}")]
    Projection { zoom: u8, reason: String },

    #[error("feature {id:?} has a non-finite position ({lat}, {lng})")]
    InvalidPosition { id: String, lat: f64, lng: f64 },

    #[error("invalid feature data: {0}")]
    Features(#[from] serde_json::Error),
}

pub type Result<T, E = LabelError> = std::result::Result<T, E>;
