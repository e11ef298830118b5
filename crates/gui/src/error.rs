//! Error type shared by every viewer module.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("invalid viewer config: {0}")]
    InvalidConfig(String),

    #[error("a previous activation is still running; tear it down first")]
    AlreadyActive,

    #[error("host container already holds a rendering surface")]
    HostOccupied,

    #[error("host container is detached or has no size")]
    HostDetached,

    #[error("render backend error: {0}")]
    Backend(String),

    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("2D drawing context unavailable: {0}")]
    Canvas(String),
}
