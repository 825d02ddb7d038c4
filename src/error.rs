//! Error types for the flow engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    /// The subsampled grid leaves no room for a full match window.
    #[error(
        "invalid dimensions: subsampled grid {width}x{height} is too small for search distance {search_distance}"
    )]
    InvalidDimensions {
        width: u32,
        height: u32,
        search_distance: u32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
