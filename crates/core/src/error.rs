//! Error types for taudem-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for data and codec operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("GeoTIFF error in {path}: {reason}")]
    GeoTiff { path: PathBuf, reason: String },

    #[error("Shapefile error in {path}: {reason}")]
    Shapefile { path: PathBuf, reason: String },

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Table error at line {line}: {reason}")]
    Table { line: usize, reason: String },

    #[error("Unknown table column: {0}")]
    UnknownColumn(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for taudem-core operations
pub type Result<T> = std::result::Result<T, Error>;
