//! # taudem-core
//!
//! In-memory data types and file codecs shared by the TauDEM wrappers.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid backed by `ndarray`
//! - `GeoTransform`: affine pixel-to-map transformation
//! - `FeatureCollection`: vector layer (geometry + attributes)
//! - `Table`: whitespace-delimited text tables
//! - I/O for GeoTIFF, ESRI shapefiles and text tables

pub mod error;
pub mod io;
pub mod raster;
pub mod table;
pub mod vector;

pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use table::Table;
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::table::Table;
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
}
