// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data URI: {0}")]
    DataUri(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to parse SVG: {0}")]
    Svg(#[from] usvg::Error),

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}
