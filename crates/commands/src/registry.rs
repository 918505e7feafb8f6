//! The TauDEM commands known to this crate
//!
//! Argument order follows the tools' usage lines: required inputs, outputs,
//! then optional inputs. Names are what keyword bindings match against.

use crate::argument::ArgumentDescriptor as Arg;
use crate::command::CommandDescriptor;
use crate::error::{CommandError, Result};

/// Columns of the stream network tree file written by `streamnet`
pub const TREE_COLUMNS: &[&str] = &[
    "link_no",
    "start_point",
    "end_point",
    "next_link",
    "prev_link1",
    "prev_link2",
    "order",
    "monitoring_point",
    "network_magnitude",
];

/// Columns of the stream network coordinate file written by `streamnet`
pub const COORD_COLUMNS: &[&str] = &["x", "y", "distance_to_end", "elevation", "contributing_area"];

/// Fill pits in a DEM
pub fn pitremove() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "pitremove",
        vec![
            Arg::grid_input("demgrid", "z").with_help("elevation grid"),
            Arg::grid_output("pitfilleddemgrid", "fel"),
            Arg::grid_input("upserdirgrid", "sfdr").optional(),
            Arg::grid_input("depmask", "depmask")
                .optional()
                .with_help("cells marked as real depressions are left unfilled"),
            Arg::switch("fourway", "4way").with_help("only fill in the four cardinal directions"),
        ],
    )
}

/// D8 flow directions and slopes
pub fn d8flowdir() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "d8flowdir",
        vec![
            Arg::grid_input("pitfilleddem", "fel"),
            Arg::grid_output("d8pointergrid", "p"),
            Arg::grid_output("d8slopegrid", "sd8"),
            Arg::grid_input("upserdirgrid", "sfdr").optional(),
        ],
    )
}

/// D-infinity flow angles and slopes
pub fn dinfflowdir() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "dinfflowdir",
        vec![
            Arg::grid_input("pitfilleddem", "fel"),
            Arg::grid_output("dinfangle", "ang"),
            Arg::grid_output("dinfslope", "slp"),
        ],
    )
}

/// D8 contributing area
pub fn aread8() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "aread8",
        vec![
            Arg::grid_input("d8pointergrid", "p"),
            Arg::grid_output("upstreamareagrid", "ad8"),
            Arg::vector_input("outlets", "o").optional(),
            Arg::grid_input("weightgrid", "wg").optional(),
            Arg::switch("nc", "nc").with_help("skip edge contamination checking"),
        ],
    )
}

/// D-infinity specific catchment area
pub fn areadinf() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "areadinf",
        vec![
            Arg::grid_input("dinfangle", "ang"),
            Arg::grid_output("specificcatchmentarea", "sca"),
            Arg::vector_input("outlets", "o").optional(),
            Arg::grid_input("weightgrid", "wg").optional(),
            Arg::switch("nc", "nc").with_help("skip edge contamination checking"),
        ],
    )
}

/// Longest and total upslope path lengths and Strahler order
pub fn gridnet() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "gridnet",
        vec![
            Arg::grid_input("d8pointergrid", "p"),
            Arg::grid_output("longestpathgrid", "plen"),
            Arg::grid_output("totalpathgrid", "tlen"),
            Arg::grid_output("strahlerordergrid", "gord"),
            Arg::vector_input("outlets", "o").optional(),
            Arg::grid_input("maskgrid", "mask").optional(),
            Arg::scalar("maskthreshold", "thresh").optional(),
        ],
    )
}

/// Stream raster from an accumulated source area grid
pub fn threshold() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "threshold",
        vec![
            Arg::grid_input("accumulatedgrid", "ssa"),
            Arg::grid_output("streamrastergrid", "src"),
            Arg::scalar("threshold", "thresh").with_help("minimum accumulated value of a stream cell"),
            Arg::grid_input("maskgrid", "mask").optional(),
        ],
    )
}

/// Stream source indicator from Peuker-Douglas valley detection
pub fn peukerdouglas() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "peukerdouglas",
        vec![
            Arg::grid_input("pitfilleddem", "fel"),
            Arg::grid_output("streamsourcegrid", "ss"),
            Arg::scalar("weights", "par")
                .optional()
                .with_help("center, side and diagonal smoothing weights"),
        ],
    )
}

/// Snap outlet points onto the stream raster
pub fn moveoutletstostrm() -> Result<CommandDescriptor> {
    CommandDescriptor::with_alternates(
        "moveoutletstostrm",
        &["moveoutletstostrm", "MoveOutletsToStreams"],
        vec![
            Arg::grid_input("d8pointergrid", "p"),
            Arg::grid_input("streamrastergrid", "src"),
            Arg::vector_input("outlets", "o"),
            Arg::vector_output("movedoutlets", "om"),
            Arg::scalar("maxdistance", "md")
                .optional()
                .with_help("maximum number of grid cells to move an outlet"),
        ],
    )
}

/// Vector stream network, link topology and watersheds
pub fn streamnet() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "streamnet",
        vec![
            Arg::grid_input("pitfilleddem", "fel"),
            Arg::grid_input("d8pointergrid", "p"),
            Arg::grid_input("contributingareagrid", "ad8"),
            Arg::grid_input("streamrastergrid", "src"),
            Arg::grid_output("streamordergrid", "ord"),
            Arg::table_output("networktree", "tree").with_columns(TREE_COLUMNS),
            Arg::table_output("networkcoordinates", "coord").with_columns(COORD_COLUMNS),
            Arg::vector_output("streamnetwork", "net"),
            Arg::grid_output("watershedgrid", "w"),
            Arg::vector_input("outlets", "o").optional(),
            Arg::switch("singlewatershed", "sw").with_help("delineate a single watershed"),
        ],
    )
}

/// Watersheds draining to each gage
pub fn gagewatershed() -> Result<CommandDescriptor> {
    CommandDescriptor::new(
        "gagewatershed",
        vec![
            Arg::grid_input("d8pointergrid", "p"),
            Arg::vector_input("outlets", "o"),
            Arg::grid_output("gagewatershedgrid", "gw"),
            Arg::table_output("watershedconnectivity", "id"),
        ],
    )
}

/// Every registered command, in workflow order
pub fn commands() -> Result<Vec<CommandDescriptor>> {
    [
        pitremove,
        d8flowdir,
        dinfflowdir,
        aread8,
        areadinf,
        gridnet,
        threshold,
        peukerdouglas,
        moveoutletstostrm,
        streamnet,
        gagewatershed,
    ]
    .iter()
    .map(|build| build())
    .collect()
}

/// Look a command up by name, ignoring case
pub fn find_command(name: &str) -> Result<CommandDescriptor> {
    commands()?
        .into_iter()
        .find(|cmd| cmd.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))
}
