//! Typed wrappers over the registry commands
//!
//! Each tool binds its inputs by keyword, asks for georeferenced grids back
//! and unpacks the returned values into a named struct.

use crate::error::{CommandError, Result};
use crate::registry;
use crate::settings::Settings;
use crate::value::{CommandOutput, OutputValue};
use taudem_core::{FeatureCollection, Raster, Table};

/// A TauDEM tool with typed inputs and outputs
pub trait Tool {
    /// Data the tool operates on
    type Input;
    /// Unpacked results
    type Output;
    /// Options controlling the run
    type Params: Default;

    /// Registry name of the underlying command
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn run(&self, settings: &Settings, input: Self::Input, params: Self::Params) -> Result<Self::Output>;

    /// Run with default parameters
    fn run_default(&self, settings: &Settings, input: Self::Input) -> Result<Self::Output> {
        self.run(settings, input, Self::Params::default())
    }
}

/// Pull returned values off in declaration order
struct Returned(std::vec::IntoIter<OutputValue>);

impl Returned {
    fn new(output: CommandOutput) -> Self {
        Self(output.into_values().into_iter())
    }

    fn next(&mut self) -> Result<OutputValue> {
        self.0.next().ok_or(CommandError::UnexpectedOutput {
            expected: "another output",
            found: "nothing",
        })
    }

    fn raster(&mut self) -> Result<Raster<f64>> {
        self.next()?.into_raster()
    }

    fn table(&mut self) -> Result<Table> {
        self.next()?.into_table()
    }

    fn vector(&mut self) -> Result<FeatureCollection> {
        self.next()?.into_vector()
    }
}

/// Fill pits so every cell drains to the grid edge
#[derive(Debug, Clone, Default)]
pub struct PitRemove;

#[derive(Debug, Clone, Default)]
pub struct PitRemoveParams {
    /// Fill considering only the four cardinal neighbours
    pub four_way: bool,
    /// Non-zero cells are real depressions and are not filled
    pub depression_mask: Option<Raster<f64>>,
}

impl Tool for PitRemove {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = PitRemoveParams;

    fn name(&self) -> &'static str {
        "pitremove"
    }

    fn description(&self) -> &'static str {
        "Fill pits in a digital elevation model"
    }

    fn run(&self, settings: &Settings, dem: Raster<f64>, params: PitRemoveParams) -> Result<Raster<f64>> {
        let cmd = registry::pitremove()?;
        let mut call = cmd
            .call()
            .kwarg("demgrid", dem)
            .kwarg("fourway", params.four_way)
            .as_array(false);
        if let Some(mask) = params.depression_mask {
            call = call.kwarg("depmask", mask);
        }
        call.run(settings)?.into_single()?.into_raster()
    }
}

/// D8 flow pointer and slope grids
#[derive(Debug, Clone, Default)]
pub struct D8FlowDir;

#[derive(Debug, Clone, PartialEq)]
pub struct D8FlowDirOutput {
    pub pointer: Raster<f64>,
    pub slope: Raster<f64>,
}

impl Tool for D8FlowDir {
    type Input = Raster<f64>;
    type Output = D8FlowDirOutput;
    type Params = ();

    fn name(&self) -> &'static str {
        "d8flowdir"
    }

    fn description(&self) -> &'static str {
        "D8 flow directions and slopes from a pit-filled DEM"
    }

    fn run(&self, settings: &Settings, fel: Raster<f64>, _params: ()) -> Result<D8FlowDirOutput> {
        let cmd = registry::d8flowdir()?;
        let output = cmd.call().kwarg("pitfilleddem", fel).as_array(false).run(settings)?;
        let mut returned = Returned::new(output);
        Ok(D8FlowDirOutput {
            pointer: returned.raster()?,
            slope: returned.raster()?,
        })
    }
}

/// Number of cells draining through each cell along D8 directions
#[derive(Debug, Clone, Default)]
pub struct AreaD8;

#[derive(Debug, Clone, Default)]
pub struct AreaD8Params {
    /// Only accumulate upstream of these points
    pub outlets: Option<FeatureCollection>,
    /// Per-cell weights instead of a count of one
    pub weights: Option<Raster<f64>>,
    pub skip_edge_check: bool,
}

impl Tool for AreaD8 {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = AreaD8Params;

    fn name(&self) -> &'static str {
        "aread8"
    }

    fn description(&self) -> &'static str {
        "D8 contributing area"
    }

    fn run(&self, settings: &Settings, pointer: Raster<f64>, params: AreaD8Params) -> Result<Raster<f64>> {
        let cmd = registry::aread8()?;
        let mut call = cmd
            .call()
            .kwarg("d8pointergrid", pointer)
            .kwarg("nc", params.skip_edge_check)
            .as_array(false);
        if let Some(outlets) = params.outlets {
            call = call.kwarg("outlets", outlets);
        }
        if let Some(weights) = params.weights {
            call = call.kwarg("weightgrid", weights);
        }
        call.run(settings)?.into_single()?.into_raster()
    }
}

/// Stream raster: cells whose accumulated value reaches a threshold
#[derive(Debug, Clone, Default)]
pub struct Threshold;

#[derive(Debug, Clone)]
pub struct ThresholdParams {
    pub threshold: f64,
    pub mask: Option<Raster<f64>>,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            threshold: 100.0,
            mask: None,
        }
    }
}

impl Tool for Threshold {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ThresholdParams;

    fn name(&self) -> &'static str {
        "threshold"
    }

    fn description(&self) -> &'static str {
        "Delineate a stream raster from accumulated area"
    }

    fn run(&self, settings: &Settings, accumulated: Raster<f64>, params: ThresholdParams) -> Result<Raster<f64>> {
        let cmd = registry::threshold()?;
        let mut call = cmd
            .call()
            .kwarg("accumulatedgrid", accumulated)
            .kwarg("threshold", params.threshold)
            .as_array(false);
        if let Some(mask) = params.mask {
            call = call.kwarg("maskgrid", mask);
        }
        call.run(settings)?.into_single()?.into_raster()
    }
}

/// Vector stream network with link topology and subwatersheds
#[derive(Debug, Clone, Default)]
pub struct StreamNet;

#[derive(Debug, Clone)]
pub struct StreamNetInput {
    pub fel: Raster<f64>,
    pub pointer: Raster<f64>,
    pub area: Raster<f64>,
    pub streams: Raster<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamNetParams {
    pub outlets: Option<FeatureCollection>,
    pub single_watershed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamNetOutput {
    pub order: Raster<f64>,
    /// One row per link, see [`registry::TREE_COLUMNS`]
    pub tree: Table,
    /// One row per network vertex, see [`registry::COORD_COLUMNS`]
    pub coordinates: Table,
    pub network: FeatureCollection,
    pub watersheds: Raster<f64>,
}

impl Tool for StreamNet {
    type Input = StreamNetInput;
    type Output = StreamNetOutput;
    type Params = StreamNetParams;

    fn name(&self) -> &'static str {
        "streamnet"
    }

    fn description(&self) -> &'static str {
        "Stream network topology, order and watersheds"
    }

    fn run(&self, settings: &Settings, input: StreamNetInput, params: StreamNetParams) -> Result<StreamNetOutput> {
        let cmd = registry::streamnet()?;
        let mut call = cmd
            .call()
            .kwarg("pitfilleddem", input.fel)
            .kwarg("d8pointergrid", input.pointer)
            .kwarg("contributingareagrid", input.area)
            .kwarg("streamrastergrid", input.streams)
            .kwarg("singlewatershed", params.single_watershed)
            .as_array(false);
        if let Some(outlets) = params.outlets {
            call = call.kwarg("outlets", outlets);
        }

        let mut returned = Returned::new(call.run(settings)?);
        Ok(StreamNetOutput {
            order: returned.raster()?,
            tree: returned.table()?,
            coordinates: returned.table()?,
            network: returned.vector()?,
            watersheds: returned.raster()?,
        })
    }
}

/// Watershed draining to each gage point
#[derive(Debug, Clone, Default)]
pub struct GageWatershed;

#[derive(Debug, Clone)]
pub struct GageWatershedInput {
    pub pointer: Raster<f64>,
    pub gages: FeatureCollection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GageWatershedOutput {
    pub watersheds: Raster<f64>,
    /// Each gage id and the id of the gage downstream of it
    pub connectivity: Table,
}

impl Tool for GageWatershed {
    type Input = GageWatershedInput;
    type Output = GageWatershedOutput;
    type Params = ();

    fn name(&self) -> &'static str {
        "gagewatershed"
    }

    fn description(&self) -> &'static str {
        "Watersheds upstream of each gage"
    }

    fn run(&self, settings: &Settings, input: GageWatershedInput, _params: ()) -> Result<GageWatershedOutput> {
        let cmd = registry::gagewatershed()?;
        let output = cmd
            .call()
            .kwarg("d8pointergrid", input.pointer)
            .kwarg("outlets", input.gages)
            .as_array(false)
            .run(settings)?;
        let mut returned = Returned::new(output);
        Ok(GageWatershedOutput {
            watersheds: returned.raster()?,
            connectivity: returned.table()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_are_registered() {
        let names = [
            PitRemove.name(),
            D8FlowDir.name(),
            AreaD8.name(),
            Threshold.name(),
            StreamNet.name(),
            GageWatershed.name(),
        ];
        for name in names {
            assert!(registry::find_command(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_returned_runs_out() {
        let mut returned = Returned::new(CommandOutput::Tuple(Vec::new()));
        assert!(matches!(returned.raster(), Err(CommandError::UnexpectedOutput { .. })));
    }

    #[test]
    fn test_threshold_default() {
        assert_eq!(ThresholdParams::default().threshold, 100.0);
    }
}
