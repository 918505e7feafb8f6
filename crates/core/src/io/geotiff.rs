//! Single-band GeoTIFF reading and writing
//!
//! Uses the `tiff` crate directly. Georeferencing is stored in the
//! ModelPixelScale/ModelTiepoint tags for north-up grids and in
//! ModelTransformation otherwise; nodata uses the GDAL_NODATA ASCII tag,
//! which is what TauDEM (through GDAL) reads and writes.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray64Float};
use tiff::encoder::{ImageEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// Newer `tiff` releases name the GeoTIFF tags; lookups must use the same
// variant the decoder produced when parsing the IFD.
fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Sample type used when encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    #[default]
    Float32,
    Float64,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample_format: SampleFormat,
}

/// Read a GeoTIFF file into a Raster.
///
/// Only the first image is decoded; `band` is accepted for call-site
/// symmetry and must be `None` or `Some(1)`.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(b) = band.filter(|&b| b != 1) {
        return Err(Error::GeoTiff {
            path: path.to_path_buf(),
            reason: format!("band {b} requested, only single-band files are supported"),
        });
    }

    let file = File::open(path)?;
    let raster = decode_geotiff(BufReader::new(file)).map_err(|reason| Error::GeoTiff {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!(path = %path.display(), rows = raster.rows(), cols = raster.cols(), "read geotiff");
    Ok(raster)
}

fn decode_geotiff<T, R>(reader: R) -> std::result::Result<Raster<T>, String>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| format!("TIFF decode error: {e}"))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| format!("cannot read dimensions: {e}"))?;
    let (rows, cols) = (height as usize, width as usize);

    let image = decoder
        .read_image()
        .map_err(|e| format!("cannot read image data: {e}"))?;

    let data: Vec<T> = match image {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => return Err("unsupported TIFF pixel format".to_string()),
    };

    if data.len() != rows * cols {
        return Err(format!(
            "expected {} samples for a {cols}x{rows} single-band image, found {}",
            rows * cols,
            data.len()
        ));
    }

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| e.to_string())?;
    let mut raster = Raster::from_array(array);

    if let Some(transform) = read_transform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

fn cast_all<S, T>(buf: &[S]) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let (Ok(scale), Ok(tiepoint)) = (
        decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)),
        decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)),
    ) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major matrix; only the 2D affine part is used
    let m = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION)).ok()?;
    if m.len() < 8 {
        return None;
    }
    Some(GeoTransform {
        origin_x: m[3],
        origin_y: m[7],
        pixel_width: m[0],
        pixel_height: m[5],
        row_rotation: m[1],
        col_rotation: m[4],
    })
}

fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Option<T>
where
    T: RasterElement,
    R: Read + Seek,
{
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    num_traits::cast(value)
}

/// Write a Raster to a single-band GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let options = options.unwrap_or_default();
    let file = BufWriter::new(File::create(path)?);

    encode_geotiff(raster, file, &options).map_err(|reason| Error::GeoTiff {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!(path = %path.display(), rows = raster.rows(), cols = raster.cols(), "wrote geotiff");
    Ok(())
}

/// Write a bare array with an optional transform.
///
/// The transform may be a [`GeoTransform`] or a GDAL-order `[f64; 6]`;
/// without one [`GeoTransform::PLACEHOLDER`] is used. Cells are written as
/// 64-bit floats.
pub fn to_geotiff<P, G>(array: &Array2<f64>, transform: Option<G>, path: P) -> Result<()>
where
    P: AsRef<Path>,
    G: Into<GeoTransform>,
{
    let raster = Raster::from_array(array.clone())
        .with_transform(transform.map_or(GeoTransform::PLACEHOLDER, Into::into));
    let options = GeoTiffOptions {
        sample_format: SampleFormat::Float64,
    };
    write_geotiff(&raster, path, Some(options))
}

fn encode_geotiff<T, W>(
    raster: &Raster<T>,
    writer: W,
    options: &GeoTiffOptions,
) -> std::result::Result<(), String>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(|e| format!("TIFF encoder error: {e}"))?;
    let (rows, cols) = raster.shape();
    let (width, height) = (cols as u32, rows as u32);

    match options.sample_format {
        SampleFormat::Float32 => {
            let data: Vec<f32> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                .collect();
            let mut image = encoder
                .new_image::<Gray32Float>(width, height)
                .map_err(|e| format!("cannot create TIFF image: {e}"))?;
            write_geo_tags(&mut image, raster)?;
            image
                .write_data(&data)
                .map_err(|e| format!("cannot write image data: {e}"))
        }
        SampleFormat::Float64 => {
            let data: Vec<f64> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f64::NAN))
                .collect();
            let mut image = encoder
                .new_image::<Gray64Float>(width, height)
                .map_err(|e| format!("cannot create TIFF image: {e}"))?;
            write_geo_tags(&mut image, raster)?;
            image
                .write_data(&data)
                .map_err(|e| format!("cannot write image data: {e}"))
        }
    }
}

fn write_geo_tags<W, C, K, T>(
    image: &mut ImageEncoder<'_, W, C, K>,
    raster: &Raster<T>,
) -> std::result::Result<(), String>
where
    W: Write + Seek,
    C: tiff::encoder::colortype::ColorType,
    K: TiffKind,
    T: RasterElement,
{
    let gt = raster.transform();
    let tags = image.encoder();

    if gt.is_north_up() {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        tags.write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(|e| format!("cannot write scale tag: {e}"))?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        tags.write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(|e| format!("cannot write tiepoint tag: {e}"))?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        tags.write_tag(tag(MODEL_TRANSFORMATION), &matrix[..])
            .map_err(|e| format!("cannot write transformation tag: {e}"))?;
    }

    // Minimal key directory so GDAL treats the file as a GeoTIFF:
    // GTModelTypeGeoKey = Projected, GTRasterTypeGeoKey = PixelIsArea.
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    tags.write_tag(tag(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| format!("cannot write geokey tag: {e}"))?;

    if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
        let text = nodata.to_string();
        tags.write_tag(tag(GDAL_NODATA), text.as_str())
            .map_err(|e| format!("cannot write nodata tag: {e}"))?;
    }

    Ok(())
}
