//! File codecs for grids, vector layers and text tables

mod geotiff;
mod shp;
mod text;

pub use geotiff::{read_geotiff, to_geotiff, write_geotiff, GeoTiffOptions, SampleFormat};
pub use shp::{read_shapefile, write_shapefile};
pub use text::{read_table, write_table};
