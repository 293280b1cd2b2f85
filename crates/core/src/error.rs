//! Error types for FlowTrace

use thiserror::Error;

/// Main error type for FlowTrace operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The direction raster cannot be interpreted by any known encoding.
    #[error("Unusable flow direction range: maximum value {max} (expected 1..=360)")]
    DirectionRange { max: i64 },

    /// Upstream traversal re-entered a cell that is still being computed.
    #[error("Flow direction cycle detected at ({row}, {col})")]
    FlowCycle { row: usize, col: usize },

    #[error("Recursion depth limit of {limit} exceeded; use the iterative traversal")]
    RecursionLimit { limit: usize },

    #[error("No headwater found upstream of outlet at ({row}, {col})")]
    NoHeadwater { row: usize, col: usize },

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Result type alias for FlowTrace operations
pub type Result<T> = std::result::Result<T, Error>;
