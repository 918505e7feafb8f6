//! ESRI shapefile reading and writing
//!
//! The `.shp/.shx/.dbf` triple is handled by the `shapefile` crate. Every
//! feature of a layer must share one geometry family (points, multipoints,
//! lines or polygons) since a shapefile holds a single shape type.

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::record::EsriShape;
use shapefile::{Multipoint as ShpMultipoint, Point as ShpPoint, PolygonRing, Shape};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Read a shapefile and its attribute table
pub fn read_shapefile<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let shapes = shapefile::read(path).map_err(|e| shp_error(path, e))?;

    let features = shapes
        .into_iter()
        .map(|(shape, record)| {
            Ok(Feature {
                geometry: shape_to_geometry(shape)?,
                properties: record_to_properties(record),
            })
        })
        .collect::<Result<FeatureCollection>>()?;

    debug!(path = %path.display(), features = features.len(), "read shapefile");
    Ok(features)
}

/// Write a layer as a shapefile.
///
/// The attribute schema is the union of all property names; the field type
/// comes from the first non-null value seen for each name. Names longer than
/// 10 characters are rejected by the DBF format.
pub fn write_shapefile<P: AsRef<Path>>(layer: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    let schema = attribute_schema(layer);

    let mut table = TableWriterBuilder::new();
    for (name, kind) in &schema {
        let field = FieldName::try_from(name.as_str()).map_err(|e| Error::Shapefile {
            path: path.to_path_buf(),
            reason: format!("invalid field name {name:?}: {e:?}"),
        })?;
        table = match kind {
            FieldKind::Logical => table.add_logical_field(field),
            FieldKind::Integer => table.add_numeric_field(field, 18, 0),
            FieldKind::Float => table.add_numeric_field(field, 20, 8),
            FieldKind::Character => table.add_character_field(field, 254),
        };
    }

    let family = layer_family(layer)?;
    let records: Vec<Record> = layer.iter().map(|f| feature_record(f, &schema)).collect();
    let geometries = layer
        .iter()
        .map(|f| f.geometry.as_ref().ok_or_else(|| missing_geometry(path)));

    match family {
        Family::Point => {
            let shapes = geometries
                .map(|g| match g? {
                    Geometry::Point(p) => Ok(shp_point(p.0)),
                    other => Err(mixed_geometry(path, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, table, &shapes, &records)?;
        }
        Family::Multipoint => {
            let shapes = geometries
                .map(|g| match g? {
                    Geometry::MultiPoint(mp) => {
                        Ok(ShpMultipoint::new(mp.iter().map(|p| shp_point(p.0)).collect()))
                    }
                    other => Err(mixed_geometry(path, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, table, &shapes, &records)?;
        }
        Family::Line => {
            let shapes = geometries
                .map(|g| match g? {
                    Geometry::LineString(ls) => Ok(shapefile::Polyline::new(line_points(ls))),
                    Geometry::MultiLineString(mls) => Ok(shapefile::Polyline::with_parts(
                        mls.iter().map(line_points).collect(),
                    )),
                    other => Err(mixed_geometry(path, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, table, &shapes, &records)?;
        }
        Family::Polygon => {
            let shapes = geometries
                .map(|g| match g? {
                    Geometry::Polygon(pg) => Ok(shapefile::Polygon::with_rings(polygon_rings(pg))),
                    Geometry::MultiPolygon(mpg) => Ok(shapefile::Polygon::with_rings(
                        mpg.iter().flat_map(polygon_rings).collect(),
                    )),
                    other => Err(mixed_geometry(path, other)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_shapes(path, table, &shapes, &records)?;
        }
    }

    debug!(path = %path.display(), features = layer.len(), "wrote shapefile");
    Ok(())
}

fn write_shapes<S: EsriShape>(
    path: &Path,
    table: TableWriterBuilder,
    shapes: &[S],
    records: &[Record],
) -> Result<()> {
    let mut writer = shapefile::Writer::from_path(path, table).map_err(|e| shp_error(path, e))?;
    for (shape, record) in shapes.iter().zip(records) {
        writer
            .write_shape_and_record(shape, record)
            .map_err(|e| shp_error(path, e))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Point,
    Multipoint,
    Line,
    Polygon,
}

fn layer_family(layer: &FeatureCollection) -> Result<Family> {
    let first = layer.iter().find_map(|f| f.geometry.as_ref());
    match first {
        // An empty layer still needs a shape type in the header
        None => Ok(Family::Point),
        Some(Geometry::Point(_)) => Ok(Family::Point),
        Some(Geometry::MultiPoint(_)) => Ok(Family::Multipoint),
        Some(Geometry::LineString(_) | Geometry::MultiLineString(_)) => Ok(Family::Line),
        Some(Geometry::Polygon(_) | Geometry::MultiPolygon(_)) => Ok(Family::Polygon),
        Some(other) => Err(Error::UnsupportedGeometry(geometry_name(other).to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Logical,
    Integer,
    Float,
    Character,
}

fn attribute_schema(layer: &FeatureCollection) -> BTreeMap<String, FieldKind> {
    let mut schema: BTreeMap<String, Option<FieldKind>> = BTreeMap::new();
    for feature in layer.iter() {
        for (name, value) in &feature.properties {
            let kind = match value {
                AttributeValue::Null => None,
                AttributeValue::Bool(_) => Some(FieldKind::Logical),
                AttributeValue::Int(_) => Some(FieldKind::Integer),
                AttributeValue::Float(_) => Some(FieldKind::Float),
                AttributeValue::String(_) => Some(FieldKind::Character),
            };
            let entry = schema.entry(name.clone()).or_insert(None);
            match (*entry, kind) {
                (None, k) => *entry = k,
                // Mixed integer/float columns widen to float
                (Some(FieldKind::Integer), Some(FieldKind::Float)) => *entry = kind,
                _ => {}
            }
        }
    }
    schema
        .into_iter()
        .map(|(name, kind)| (name, kind.unwrap_or(FieldKind::Character)))
        .collect()
}

fn feature_record(feature: &Feature, schema: &BTreeMap<String, FieldKind>) -> Record {
    let mut record = Record::default();
    for (name, kind) in schema {
        let value = feature.get_property(name).unwrap_or(&AttributeValue::Null);
        let field = match (kind, value) {
            (FieldKind::Logical, AttributeValue::Bool(b)) => FieldValue::Logical(Some(*b)),
            (FieldKind::Logical, _) => FieldValue::Logical(None),
            (FieldKind::Integer | FieldKind::Float, v) => FieldValue::Numeric(v.as_f64()),
            (FieldKind::Character, AttributeValue::Null) => FieldValue::Character(None),
            (FieldKind::Character, AttributeValue::String(s)) => FieldValue::Character(Some(s.clone())),
            (FieldKind::Character, AttributeValue::Bool(b)) => FieldValue::Character(Some(b.to_string())),
            (FieldKind::Character, AttributeValue::Int(i)) => FieldValue::Character(Some(i.to_string())),
            (FieldKind::Character, AttributeValue::Float(f)) => FieldValue::Character(Some(f.to_string())),
        };
        record.insert(name.clone(), field);
    }
    record
}

fn record_to_properties(record: Record) -> BTreeMap<String, AttributeValue> {
    HashMap::<String, FieldValue>::from(record)
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::Character(Some(s)) => AttributeValue::String(s.trim_end().to_string()),
                FieldValue::Numeric(Some(v)) if v.fract() == 0.0 && v.abs() < 9.0e15 => {
                    AttributeValue::Int(v as i64)
                }
                FieldValue::Numeric(Some(v)) | FieldValue::Double(v) => AttributeValue::Float(v),
                FieldValue::Float(Some(v)) => AttributeValue::Float(f64::from(v)),
                FieldValue::Integer(v) => AttributeValue::Int(i64::from(v)),
                FieldValue::Logical(Some(b)) => AttributeValue::Bool(b),
                FieldValue::Character(None)
                | FieldValue::Numeric(None)
                | FieldValue::Float(None)
                | FieldValue::Logical(None) => AttributeValue::Null,
                other => AttributeValue::String(format!("{other:?}")),
            };
            (name, value)
        })
        .collect()
}

fn shape_to_geometry(shape: Shape) -> Result<Option<Geometry<f64>>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointZ(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointM(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::Multipoint(mp) => Geometry::MultiPoint(MultiPoint::new(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        )),
        Shape::Polyline(pl) => {
            let mut parts: Vec<LineString<f64>> = pl
                .parts()
                .iter()
                .map(|part| part.iter().map(|p| Coord { x: p.x, y: p.y }).collect())
                .collect();
            if parts.len() == 1 {
                Geometry::LineString(parts.remove(0))
            } else {
                Geometry::MultiLineString(MultiLineString::new(parts))
            }
        }
        Shape::Polygon(pg) => {
            let mut polygons: Vec<Polygon<f64>> = Vec::new();
            for ring in pg.rings() {
                let coords: LineString<f64> =
                    ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect();
                if let (PolygonRing::Inner(_), Some(current)) = (ring, polygons.last_mut()) {
                    current.interiors_push(coords);
                    continue;
                }
                polygons.push(Polygon::new(coords, Vec::new()));
            }
            if polygons.len() == 1 {
                Geometry::Polygon(polygons.remove(0))
            } else {
                Geometry::MultiPolygon(MultiPolygon::new(polygons))
            }
        }
        other => return Err(Error::UnsupportedGeometry(format!("{:?}", other.shapetype()))),
    };
    Ok(Some(geometry))
}

fn shp_point(c: Coord<f64>) -> ShpPoint {
    ShpPoint::new(c.x, c.y)
}

fn line_points(ls: &LineString<f64>) -> Vec<ShpPoint> {
    ls.coords().map(|c| shp_point(*c)).collect()
}

fn polygon_rings(pg: &Polygon<f64>) -> Vec<PolygonRing<ShpPoint>> {
    std::iter::once(PolygonRing::Outer(line_points(pg.exterior())))
        .chain(pg.interiors().iter().map(|r| PolygonRing::Inner(line_points(r))))
        .collect()
}

fn geometry_name(g: &Geometry<f64>) -> &'static str {
    match g {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn shp_error(path: &Path, e: shapefile::Error) -> Error {
    Error::Shapefile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn missing_geometry(path: &Path) -> Error {
    Error::Shapefile {
        path: path.to_path_buf(),
        reason: "feature without geometry".to_string(),
    }
}

fn mixed_geometry(path: &Path, g: &Geometry<f64>) -> Error {
    Error::Shapefile {
        path: path.to_path_buf(),
        reason: format!("cannot mix {} with the layer's first geometry type", geometry_name(g)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outlets() -> FeatureCollection {
        vec![
            Feature::new(Point::new(10.5, 20.5)).with_property("id", 1i64),
            Feature::new(Point::new(30.0, 40.0))
                .with_property("id", 2i64)
                .with_property("name", "gauge"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_point_layer_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outlets.shp");

        write_shapefile(&outlets(), &path).unwrap();
        assert!(dir.path().join("outlets.dbf").exists());
        assert!(dir.path().join("outlets.shx").exists());

        let layer = read_shapefile(&path).unwrap();
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.features[0].geometry, Some(Geometry::Point(Point::new(10.5, 20.5))));
        assert_eq!(layer.features[1].get_property("id"), Some(&AttributeValue::Int(2)));
        assert_eq!(
            layer.features[1].get_property("name"),
            Some(&AttributeValue::String("gauge".to_string()))
        );
    }

    #[test]
    fn test_line_layer_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("net.shp");
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 1.5)]);
        let layer: FeatureCollection =
            std::iter::once(Feature::new(line.clone()).with_property("LINKNO", 0i64)).collect();

        write_shapefile(&layer, &path).unwrap();
        let loaded = read_shapefile(&path).unwrap();
        assert_eq!(loaded.features[0].geometry, Some(Geometry::LineString(line)));
    }

    #[test]
    fn test_mixed_geometry_rejected() {
        let dir = TempDir::new().unwrap();
        let mut layer = outlets();
        layer.push(Feature::new(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])));
        let err = write_shapefile(&layer, dir.path().join("mixed.shp")).unwrap_err();
        assert!(matches!(err, Error::Shapefile { .. }));
    }

    #[test]
    fn test_long_field_name_rejected() {
        let dir = TempDir::new().unwrap();
        let layer: FeatureCollection = std::iter::once(
            Feature::new(Point::new(0.0, 0.0)).with_property("much_too_long_name", 1i64),
        )
        .collect();
        assert!(write_shapefile(&layer, dir.path().join("long.shp")).is_err());
    }
}
