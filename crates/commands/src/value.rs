//! Values passed into and returned from command invocations

use crate::error::{CommandError, Result};
use ndarray::Array2;
use std::path::PathBuf;
use taudem_core::{FeatureCollection, GeoTransform, Raster, Table};

/// A value bound to one argument of a call
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Bare cell array without georeferencing
    Array(Array2<f64>),
    /// Grid carrying its own transform and nodata value
    Grid(Raster<f64>),
    Vector(FeatureCollection),
    /// Anything passed through as text after the flag
    Scalar(String),
    Flag(bool),
    /// Destination for an output the caller wants kept on disk
    Path(PathBuf),
    Transform(GeoTransform),
}

impl ArgValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Grid(_) => "grid",
            Self::Vector(_) => "vector",
            Self::Scalar(_) => "scalar",
            Self::Flag(_) => "flag",
            Self::Path(_) => "path",
            Self::Transform(_) => "transform",
        }
    }

    /// Truthiness used for flag arguments
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Flag(b) => *b,
            Self::Scalar(s) => !s.is_empty(),
            Self::Array(a) => !a.is_empty(),
            Self::Grid(g) => !g.is_empty(),
            Self::Vector(v) => !v.is_empty(),
            Self::Path(_) | Self::Transform(_) => true,
        }
    }
}

impl From<Array2<f64>> for ArgValue {
    fn from(a: Array2<f64>) -> Self {
        Self::Array(a)
    }
}

impl From<Raster<f64>> for ArgValue {
    fn from(r: Raster<f64>) -> Self {
        Self::Grid(r)
    }
}

impl From<FeatureCollection> for ArgValue {
    fn from(v: FeatureCollection) -> Self {
        Self::Vector(v)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

impl From<PathBuf> for ArgValue {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<GeoTransform> for ArgValue {
    fn from(gt: GeoTransform) -> Self {
        Self::Transform(gt)
    }
}

/// A deserialized output file
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Array(Array2<f64>),
    Grid(Raster<f64>),
    Vector(FeatureCollection),
    Table(Table),
}

impl OutputValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Grid(_) => "grid",
            Self::Vector(_) => "vector",
            Self::Table(_) => "table",
        }
    }

    /// Cell array of a grid output, whichever form it was read in
    pub fn into_array(self) -> Result<Array2<f64>> {
        match self {
            Self::Array(a) => Ok(a),
            Self::Grid(g) => Ok(g.into_array()),
            other => Err(unexpected("grid", &other)),
        }
    }

    /// Georeferenced grid; bare arrays get [`GeoTransform::PLACEHOLDER`],
    /// the transform they are staged with
    pub fn into_raster(self) -> Result<Raster<f64>> {
        match self {
            Self::Grid(g) => Ok(g),
            Self::Array(a) => Ok(Raster::from_array(a).with_transform(GeoTransform::PLACEHOLDER)),
            other => Err(unexpected("grid", &other)),
        }
    }

    pub fn into_vector(self) -> Result<FeatureCollection> {
        match self {
            Self::Vector(v) => Ok(v),
            other => Err(unexpected("vector", &other)),
        }
    }

    pub fn into_table(self) -> Result<Table> {
        match self {
            Self::Table(t) => Ok(t),
            other => Err(unexpected("table", &other)),
        }
    }
}

fn unexpected(expected: &'static str, found: &OutputValue) -> CommandError {
    CommandError::UnexpectedOutput {
        expected,
        found: found.kind_name(),
    }
}

/// Everything a call returned, in declaration order.
///
/// A command with exactly one returned output yields `Single`; any other
/// count (including zero) yields `Tuple`.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Single(OutputValue),
    Tuple(Vec<OutputValue>),
}

impl CommandOutput {
    pub fn from_values(mut values: Vec<OutputValue>) -> Self {
        if values.len() == 1 {
            Self::Single(values.remove(0))
        } else {
            Self::Tuple(values)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Tuple(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_values(self) -> Vec<OutputValue> {
        match self {
            Self::Single(value) => vec![value],
            Self::Tuple(values) => values,
        }
    }

    pub fn into_single(self) -> Result<OutputValue> {
        match self {
            Self::Single(value) => Ok(value),
            Self::Tuple(_) => Err(CommandError::UnexpectedOutput {
                expected: "single",
                found: "tuple",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(ArgValue::Flag(true).is_truthy());
        assert!(!ArgValue::Flag(false).is_truthy());
        assert!(!ArgValue::from("").is_truthy());
        assert!(ArgValue::from(0.5).is_truthy());
        assert!(!ArgValue::Array(Array2::zeros((0, 0))).is_truthy());
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(ArgValue::from(100.0), ArgValue::Scalar("100".to_string()));
        assert_eq!(ArgValue::from(3i64), ArgValue::Scalar("3".to_string()));
    }

    #[test]
    fn test_output_arity() {
        let one = CommandOutput::from_values(vec![OutputValue::Table(Table::default())]);
        assert!(matches!(one, CommandOutput::Single(_)));

        let none = CommandOutput::from_values(Vec::new());
        assert_eq!(none, CommandOutput::Tuple(Vec::new()));
        assert!(none.is_empty());
    }

    #[test]
    fn test_output_conversions() {
        let grid = OutputValue::Array(Array2::from_elem((2, 2), 1.0));
        let raster = grid.clone().into_raster().unwrap();
        assert_eq!(raster.shape(), (2, 2));
        assert_eq!(*raster.transform(), GeoTransform::PLACEHOLDER);
        assert!(matches!(
            grid.into_table(),
            Err(CommandError::UnexpectedOutput { expected: "table", found: "array" })
        ));
    }
}
