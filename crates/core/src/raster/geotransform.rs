//! Affine georeferencing transform

use serde::{Deserialize, Serialize};

/// Affine coefficients mapping pixel coordinates (col, row) to map
/// coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up grids have zero rotation terms and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Transform stamped on grids that arrive without any georeferencing.
    ///
    /// Origin (1, 1) with 0.001 cells, GDAL order
    /// `(1.0, 0.001, 0.0, 1.0, 0.0, -0.001)`.
    pub const PLACEHOLDER: GeoTransform = GeoTransform {
        origin_x: 1.0,
        origin_y: 1.0,
        pixel_width: 0.001,
        pixel_height: -0.001,
        row_rotation: 0.0,
        col_rotation: 0.0,
    };

    /// North-up transform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL order `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL order
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// No rotation terms and rows running southwards.
    ///
    /// Only such transforms fit the pixel-scale/tiepoint GeoTIFF encoding.
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0 && self.pixel_height < 0.0
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

impl From<[f64; 6]> for GeoTransform {
    fn from(coeffs: [f64; 6]) -> Self {
        Self::from_gdal(coeffs)
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(gt: GeoTransform) -> Self {
        gt.to_gdal()
    }
}
