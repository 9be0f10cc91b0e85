use thiserror::Error;

pub type Result<T, E = FlaschenError> = std::result::Result<T, E>;

/// Unified error type covering the failure scenarios of the display pipeline.
#[derive(Debug, Error)]
pub enum FlaschenError {
    #[error("invalid raster dimensions {width}x{height}: width and height must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("animation contains no frames")]
    EmptyAnimation,
    #[error("composition error: {0}")]
    Composition(String),
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
