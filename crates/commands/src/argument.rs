//! Declarative description of one command-line argument
//!
//! An [`ArgumentDescriptor`] knows how to turn a bound [`ArgValue`] into
//! command-line tokens (staging grids and vector layers as files in the
//! scratch directory) and, for outputs, how to read the produced file back.

use crate::error::{CommandError, Result};
use crate::value::{ArgValue, OutputValue};
use std::path::Path;
use taudem_core::io::{
    read_geotiff, read_shapefile, read_table, write_geotiff, write_shapefile, GeoTiffOptions,
    SampleFormat,
};
use taudem_core::{GeoTransform, Raster};
use tracing::debug;

/// Whether the tool reads or produces the argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// What kind of data an argument carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Grid,
    Vector,
    /// Value passed as text after the flag
    Scalar,
    /// Bare switch, emitted only when set
    Flag,
    /// Whitespace-delimited text file
    TextTable,
    /// Call-only: return grid outputs as bare arrays (default) or rasters
    AsArray,
    /// Call-only: transform override for staged grids
    Transform,
}

impl ArgKind {
    pub fn is_pseudo(self) -> bool {
        matches!(self, Self::AsArray | Self::Transform)
    }

    /// Scratch file extension for file-backed kinds
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Grid => Some("tif"),
            Self::Vector => Some("shp"),
            Self::TextTable => Some("txt"),
            _ => None,
        }
    }

    fn type_text(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Vector => "vector coverage",
            Self::Scalar => "value",
            Self::Flag => "flag",
            Self::TextTable => "table",
            Self::AsArray => "boolean",
            Self::Transform => "transform",
        }
    }
}

/// Transforms available when a grid input is staged
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransformContext {
    /// Caller override; wins over everything
    pub explicit: Option<GeoTransform>,
    /// Fallback for bare arrays, normally the first georeferenced input
    pub ambient: Option<GeoTransform>,
}

impl TransformContext {
    fn for_array(&self) -> GeoTransform {
        self.explicit
            .or(self.ambient)
            .unwrap_or(GeoTransform::PLACEHOLDER)
    }
}

/// One argument of a TauDEM command
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDescriptor {
    name: String,
    flag: Option<String>,
    direction: Direction,
    kind: ArgKind,
    optional: bool,
    columns: Option<Vec<String>>,
    help: Option<String>,
}

impl ArgumentDescriptor {
    /// Flagless arguments are passed positionally as a bare path or value.
    pub fn new(name: &str, flag: Option<&str>, direction: Direction, kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            flag: flag.map(str::to_string),
            direction,
            kind,
            optional: false,
            columns: None,
            help: None,
        }
    }

    pub fn grid_input(name: &str, flag: &str) -> Self {
        Self::new(name, Some(flag), Direction::Input, ArgKind::Grid)
    }

    pub fn grid_output(name: &str, flag: &str) -> Self {
        Self::new(name, Some(flag), Direction::Output, ArgKind::Grid)
    }

    pub fn vector_input(name: &str, flag: &str) -> Self {
        Self::new(name, Some(flag), Direction::Input, ArgKind::Vector)
    }

    pub fn vector_output(name: &str, flag: &str) -> Self {
        Self::new(name, Some(flag), Direction::Output, ArgKind::Vector)
    }

    pub fn scalar(name: &str, flag: &str) -> Self {
        Self::new(name, Some(flag), Direction::Input, ArgKind::Scalar)
    }

    /// Switches are always optional
    pub fn switch(name: &str, flag: &str) -> Self {
        Self::new(name, Some(flag), Direction::Input, ArgKind::Flag).optional()
    }

    pub fn table_output(name: &str, flag: &str) -> Self {
        Self::new(name, Some(flag), Direction::Output, ArgKind::TextTable)
    }

    pub(crate) fn pseudo(name: &str, kind: ArgKind) -> Self {
        Self::new(name, None, Direction::Input, kind).optional()
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Fixed header for a table output whose file has no header row
    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flag(&self) -> Option<&str> {
        self.flag.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> ArgKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    pub fn is_pseudo(&self) -> bool {
        self.kind.is_pseudo()
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Case-insensitive name match
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Scratch file name, `<flag-or-name>.<ext>`
    pub fn file_name(&self) -> Option<String> {
        let stem = self.flag.as_deref().unwrap_or(&self.name);
        self.kind.extension().map(|ext| format!("{stem}.{ext}"))
    }

    /// `"<name>: <type> (optional|required)"`
    pub fn help_text(&self) -> String {
        let status = if self.optional { "optional" } else { "required" };
        let mut text = format!("{}: {} ({status})", self.name, self.kind.type_text());
        if let Some(help) = &self.help {
            text.push_str(" - ");
            text.push_str(help);
        }
        text
    }

    /// Ready `value` for the tool and return its command-line tokens.
    ///
    /// Grid and vector inputs are written into `scratch`; outputs only
    /// produce the file name the tool should create. `value` is `None` for
    /// outputs the caller left unbound.
    pub fn generate(
        &self,
        value: Option<&ArgValue>,
        transforms: &TransformContext,
        scratch: &Path,
    ) -> Result<Vec<String>> {
        match (self.direction, self.kind, value) {
            (_, kind, _) if kind.is_pseudo() => Err(self.unsupported("call option, not a tool argument")),

            (Direction::Output, _, Some(ArgValue::Path(dest))) => {
                Ok(self.with_flag(vec![dest.display().to_string()]))
            }
            (Direction::Output, _, Some(other)) => Err(self.unsupported(&format!(
                "outputs can only be bound to a destination path, got {}",
                other.kind_name()
            ))),
            (Direction::Output, ArgKind::Grid | ArgKind::Vector | ArgKind::TextTable, None) => {
                Ok(self.with_flag(vec![self.scratch_file()?]))
            }

            (Direction::Input, ArgKind::Grid, Some(value)) => {
                let file = self.scratch_file()?;
                self.write_grid(value, transforms, &scratch.join(&file))?;
                Ok(self.with_flag(vec![file]))
            }
            (Direction::Input, ArgKind::Vector, Some(value)) => {
                let file = self.scratch_file()?;
                let ArgValue::Vector(layer) = value else {
                    return Err(CommandError::VectorWriteUnsupported {
                        name: self.name.clone(),
                        reason: format!("{} values have no vector file form", value.kind_name()),
                    });
                };
                write_shapefile(layer, scratch.join(&file)).map_err(|e| {
                    CommandError::VectorWriteUnsupported {
                        name: self.name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(self.with_flag(vec![file]))
            }
            (Direction::Input, ArgKind::Flag, Some(value)) => match (&self.flag, value.is_truthy()) {
                (Some(flag), true) => Ok(vec![format!("-{flag}")]),
                (Some(_), false) => Ok(Vec::new()),
                (None, _) => Err(self.unsupported("switch without a flag")),
            },
            (Direction::Input, ArgKind::Scalar, Some(value)) => {
                let text = match value {
                    ArgValue::Scalar(s) => s.clone(),
                    ArgValue::Flag(b) => b.to_string(),
                    ArgValue::Path(p) => p.display().to_string(),
                    other => {
                        return Err(self.unsupported(&format!(
                            "{} values cannot be passed as text",
                            other.kind_name()
                        )))
                    }
                };
                // Multi-valued options ("-par 5 -1") become separate tokens
                Ok(self.with_flag(text.split_whitespace().map(str::to_string).collect()))
            }

            (direction, kind, _) => Err(self.unsupported(&format!(
                "{kind:?} {direction:?} arguments cannot be generated"
            ))),
        }
    }

    /// Read the file the tool produced for this output
    pub fn read_result(&self, scratch: &Path, as_array: bool) -> Result<OutputValue> {
        if !self.is_output() || self.kind.extension().is_none() {
            return Err(self.cannot_read("cannot read result for this argument"));
        }
        let path = scratch.join(self.scratch_file()?);
        debug!(argument = %self.name, path = %path.display(), "reading result");

        let value = match self.kind {
            ArgKind::Grid => {
                let raster: Raster<f64> =
                    read_geotiff(&path, None).map_err(|e| self.cannot_read(&e.to_string()))?;
                if as_array {
                    OutputValue::Array(raster.into_array())
                } else {
                    OutputValue::Grid(raster)
                }
            }
            ArgKind::Vector => OutputValue::Vector(
                read_shapefile(&path).map_err(|e| self.cannot_read(&e.to_string()))?,
            ),
            _ => OutputValue::Table(
                read_table(&path, self.columns()).map_err(|e| self.cannot_read(&e.to_string()))?,
            ),
        };
        Ok(value)
    }

    fn write_grid(&self, value: &ArgValue, transforms: &TransformContext, path: &Path) -> Result<()> {
        let invalid = |reason: String| CommandError::InvalidGridValue {
            name: self.name.clone(),
            reason,
        };

        let options = || {
            Some(GeoTiffOptions {
                sample_format: SampleFormat::Float64,
            })
        };

        match value {
            ArgValue::Array(array) if array.is_empty() => Err(invalid("empty array".to_string())),
            ArgValue::Grid(grid) if grid.is_empty() => Err(invalid("empty grid".to_string())),
            ArgValue::Array(array) => {
                let raster = Raster::from_array(array.clone()).with_transform(transforms.for_array());
                Ok(write_geotiff(&raster, path, options())?)
            }
            ArgValue::Grid(grid) => match transforms.explicit {
                Some(gt) => Ok(write_geotiff(&grid.clone().with_transform(gt), path, options())?),
                None => Ok(write_geotiff(grid, path, options())?),
            },
            other => Err(invalid(format!("expected an array or grid, got {}", other.kind_name()))),
        }
    }

    fn with_flag(&self, mut tokens: Vec<String>) -> Vec<String> {
        if let Some(flag) = &self.flag {
            tokens.insert(0, format!("-{flag}"));
        }
        tokens
    }

    fn scratch_file(&self) -> Result<String> {
        self.file_name()
            .ok_or_else(|| self.unsupported("argument kind has no file form"))
    }

    fn unsupported(&self, reason: &str) -> CommandError {
        CommandError::UnsupportedArgumentType {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn cannot_read(&self, reason: &str) -> CommandError {
        CommandError::CannotReadResult {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}
