//! End-to-end invocations against fake TauDEM executables.
//!
//! Each fixture owns a `bin/` directory of POSIX shell scripts standing in
//! for the real tools and a `scratch/` root that must be empty again after
//! every call.

#![cfg(unix)]

use approx::assert_relative_eq;
use ndarray::{array, Array2};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use taudem_commands::argument::ArgumentDescriptor;
use taudem_commands::tools::{PitRemove, StreamNet, StreamNetInput, Tool};
use taudem_commands::{registry, ArgValue, CommandDescriptor, CommandError, CommandOutput, OutputValue, Settings};
use taudem_core::{AttributeValue, Feature, FeatureCollection, GeoTransform, Raster};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        fs::create_dir(dir.path().join("scratch")).unwrap();
        Self { dir }
    }

    fn bin(&self) -> PathBuf {
        self.dir.path().join("bin")
    }

    fn scratch(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    fn log(&self) -> PathBuf {
        self.dir.path().join("args.log")
    }

    /// Install an executable script; `LOG` in `body` is replaced by the log path
    fn tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.bin().join(name);
        self.script(&path, body);
        path
    }

    fn script(&self, path: &Path, body: &str) {
        let script = format!("#!/bin/sh\n{}\n", body.replace("LOG", &self.log().display().to_string()));
        fs::write(path, script).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn settings(&self) -> Settings {
        Settings {
            taudem_path: self.bin(),
            use_mpi: false,
            scratch_root: Some(self.scratch()),
            ..Settings::default()
        }
    }

    fn logged(&self) -> String {
        fs::read_to_string(self.log()).unwrap().trim().to_string()
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.scratch()).unwrap().next().is_none()
    }
}

/// pitremove stand-in: copies the DEM to wherever `-fel` points
const COPY_DEM: &str = r#"printf '%s\n' "$*" > LOG
out=fel.tif
while [ $# -gt 0 ]; do
  case "$1" in
    -fel) out="$2"; shift ;;
  esac
  shift
done
cp z.tif "$out""#;

fn dem() -> Array2<f64> {
    array![[10.0, 9.0, 8.0], [9.0, 2.0, 7.0], [8.0, 7.0, 6.0]]
}

#[test]
fn test_pitremove_round_trip() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let cmd = registry::pitremove().unwrap();

    let out = cmd.call().arg(dem()).run(&fx.settings()).unwrap();

    assert_eq!(fx.logged(), "-z z.tif -fel fel.tif");
    assert_eq!(out, CommandOutput::Single(OutputValue::Array(dem())));
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_round_trip_keeps_f64_precision() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let precise = array![[0.1, 4_200_000.123], [1234.5678, 9.876_543_21]];

    let out = registry::pitremove()
        .unwrap()
        .call()
        .arg(precise.clone())
        .run(&fx.settings())
        .unwrap();

    assert_eq!(out.into_single().unwrap().into_array().unwrap(), precise);
}

#[test]
fn test_generated_invocation_function() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let cmd = registry::pitremove().unwrap();
    let pitremove = cmd.generate_invocation(fx.settings());

    let out = pitremove(&[], &[("DemGrid".to_string(), ArgValue::from(dem()))]).unwrap();
    assert_eq!(out.into_single().unwrap().into_array().unwrap(), dem());

    let err = pitremove(&[], &[]).unwrap_err();
    match err {
        CommandError::MissingRequiredArgument { names, .. } => assert_eq!(names, vec!["demgrid"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_grid_keeps_transform() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let cmd = registry::pitremove().unwrap();
    let gt = GeoTransform::new(500_000.0, 4_200_000.0, 30.0, -30.0);
    let grid = Raster::from_array(dem()).with_transform(gt);

    let filled = PitRemove.run_default(&fx.settings(), grid).unwrap();
    assert_eq!(*filled.transform(), gt);
    assert_eq!(filled.data(), &dem());

    let explicit = GeoTransform::new(0.0, 90.0, 10.0, -10.0);
    let out = cmd
        .call()
        .arg(dem())
        .transform(explicit)
        .as_array(false)
        .run(&fx.settings())
        .unwrap();
    let raster = out.into_single().unwrap().into_raster().unwrap();
    assert_eq!(*raster.transform(), explicit);
}

#[test]
fn test_bare_array_gets_placeholder_transform() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let cmd = registry::pitremove().unwrap();

    let out = cmd.call().arg(dem()).as_array(false).run(&fx.settings()).unwrap();
    let raster = out.into_single().unwrap().into_raster().unwrap();
    assert_eq!(*raster.transform(), GeoTransform::PLACEHOLDER);
}

#[test]
fn test_output_bound_to_path_is_persisted() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let cmd = registry::pitremove().unwrap();
    let dest = fx.dir.path().join("kept_fel.tif");

    let out = cmd
        .call()
        .arg(dem())
        .kwarg("pitfilleddemgrid", dest.clone())
        .run(&fx.settings())
        .unwrap();

    assert_eq!(out, CommandOutput::Tuple(Vec::new()));
    assert_eq!(fx.logged(), format!("-z z.tif -fel {}", dest.display()));
    let kept: Raster<f64> = taudem_core::io::read_geotiff(&dest, None).unwrap();
    assert_eq!(kept.data(), &dem());
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_outputs_in_declaration_order() {
    let fx = Fixture::new();
    fx.tool(
        "twotables",
        r#"printf '%s\n' "$*" > LOG
printf 'name\nfirst\n' > first.txt
printf 'name\nsecond\n' > second.txt"#,
    );
    let cmd = CommandDescriptor::new(
        "twotables",
        vec![
            ArgumentDescriptor::scalar("count", "n"),
            ArgumentDescriptor::table_output("first", "first"),
            ArgumentDescriptor::table_output("second", "second"),
            ArgumentDescriptor::scalar("limit", "l").optional(),
        ],
    )
    .unwrap();

    let out = cmd.call().kwarg("count", 3i64).run(&fx.settings()).unwrap();

    assert_eq!(fx.logged(), "-n 3 -first first.txt -second second.txt");
    let values = out.into_values();
    assert_eq!(values.len(), 2);
    let names: Vec<String> = values
        .into_iter()
        .map(|v| v.into_table().unwrap().column("name").unwrap()[0].to_string())
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn test_binding_errors_leave_no_scratch() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let cmd = registry::pitremove().unwrap();
    let settings = fx.settings();

    let too_many = cmd
        .call()
        .arg(dem())
        .arg(dem())
        .arg(dem())
        .arg(dem())
        .arg(true)
        .arg(true)
        .run(&settings);
    assert!(matches!(too_many, Err(CommandError::TooManyArguments { given: 6, accepted: 5, .. })));

    let unknown = cmd.call().arg(dem()).kwarg("elevation", dem()).run(&settings);
    assert!(matches!(unknown, Err(CommandError::UnknownArgument { .. })));

    let twice = cmd.call().arg(dem()).kwarg("demgrid", dem()).run(&settings);
    assert!(matches!(twice, Err(CommandError::DuplicateBinding { .. })));

    let not_a_grid = cmd.call().arg(5.0).run(&settings);
    assert!(matches!(not_a_grid, Err(CommandError::InvalidGridValue { .. })));

    assert!(!fx.log().exists());
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_threshold_tokens() {
    let fx = Fixture::new();
    fx.tool("threshold", r#"printf '%s\n' "$*" > LOG
cp ssa.tif src.tif"#);
    let cmd = registry::threshold().unwrap();

    cmd.call().arg(dem()).kwarg("threshold", 100.0).run(&fx.settings()).unwrap();

    // the optional mask is omitted entirely
    assert_eq!(fx.logged(), "-ssa ssa.tif -thresh 100 -src src.tif");
}

#[test]
fn test_multi_valued_scalar_and_switch() {
    let fx = Fixture::new();
    fx.tool("peukerdouglas", r#"printf '%s\n' "$*" > LOG
cp fel.tif ss.tif"#);
    fx.tool("aread8", r#"printf '%s\n' "$*" > LOG
cp p.tif ad8.tif"#);

    registry::peukerdouglas()
        .unwrap()
        .call()
        .arg(dem())
        .kwarg("weights", "0.4 0.1 0.05")
        .run(&fx.settings())
        .unwrap();
    assert_eq!(fx.logged(), "-fel fel.tif -par 0.4 0.1 0.05 -ss ss.tif");

    let aread8 = registry::aread8().unwrap();
    aread8.call().arg(dem()).kwarg("nc", true).run(&fx.settings()).unwrap();
    assert_eq!(fx.logged(), "-p p.tif -nc -ad8 ad8.tif");

    aread8.call().arg(dem()).kwarg("nc", false).run(&fx.settings()).unwrap();
    assert_eq!(fx.logged(), "-p p.tif -ad8 ad8.tif");
}

#[test]
fn test_tool_runs_in_scratch_directory() {
    let fx = Fixture::new();
    let cwd_log = fx.dir.path().join("cwd.log");
    fx.tool(
        "pitremove",
        &format!("pwd > {}\n{COPY_DEM}", cwd_log.display()),
    );
    let before = std::env::current_dir().unwrap();

    registry::pitremove().unwrap().call().arg(dem()).run(&fx.settings()).unwrap();

    let cwd = PathBuf::from(fs::read_to_string(&cwd_log).unwrap().trim());
    let scratch = fx.scratch().canonicalize().unwrap();
    assert_eq!(cwd.parent().map(|p| p.canonicalize().unwrap()), Some(scratch));
    assert!(cwd.file_name().unwrap().to_string_lossy().starts_with("taudem_"));
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn test_concurrent_calls() {
    let fx = Fixture::new();
    fx.tool("pitremove", COPY_DEM);
    let cmd = registry::pitremove().unwrap();
    let settings = fx.settings();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let (cmd, settings) = (&cmd, &settings);
                s.spawn(move || {
                    let input = dem() + f64::from(i);
                    let out = cmd.call().arg(input.clone()).run(settings).unwrap();
                    assert_eq!(out.into_single().unwrap().into_array().unwrap(), input);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_mpi_launcher_prefix() {
    let fx = Fixture::new();
    fx.tool("pitremove", "cp z.tif fel.tif");
    let mpi_dir = fx.dir.path().join("mpi");
    fs::create_dir(&mpi_dir).unwrap();
    let launcher = mpi_dir.join("fakempi");
    fx.script(
        &launcher,
        r#"printf '%s\n' "$*" > LOG
shift 2
exec "$@""#,
    );

    let settings = Settings {
        use_mpi: true,
        mpi_path: mpi_dir,
        mpi_cmd: "fakempi".to_string(),
        mpi_processes: 8,
        ..fx.settings()
    };
    let out = registry::pitremove().unwrap().call().arg(dem()).run(&settings).unwrap();

    let exe = fx.bin().join("pitremove");
    assert_eq!(fx.logged(), format!("-n 8 {} -z z.tif -fel fel.tif", exe.display()));
    assert_eq!(out.into_single().unwrap().into_array().unwrap(), dem());
}

#[test]
fn test_exit_status_policy() {
    let fx = Fixture::new();
    fx.tool("pitremove", "cp z.tif fel.tif\necho 'ERROR: bad dem' >&2\nexit 3");
    let cmd = registry::pitremove().unwrap();

    let lenient = cmd.call().arg(dem()).run(&fx.settings()).unwrap();
    assert_eq!(lenient.len(), 1);

    let strict = Settings {
        check_exit_status: true,
        ..fx.settings()
    };
    match cmd.call().arg(dem()).run(&strict) {
        Err(CommandError::ToolFailed { command, status, stderr }) => {
            assert_eq!(command, "pitremove");
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr, "ERROR: bad dem");
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_missing_output_is_read_error() {
    let fx = Fixture::new();
    fx.tool("pitremove", "exit 0");

    let result = registry::pitremove().unwrap().call().arg(dem()).run(&fx.settings());
    assert!(matches!(result, Err(CommandError::CannotReadResult { name, .. }) if name == "pitfilleddemgrid"));
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_missing_executable() {
    let fx = Fixture::new();
    let result = registry::pitremove().unwrap().call().arg(dem()).run(&fx.settings());
    assert!(matches!(result, Err(CommandError::ExecutableNotFound { .. })));
    assert!(fx.scratch_is_empty());
}

fn outlets() -> FeatureCollection {
    [
        Feature::new(geo_types::Point::new(1.5, 1.5)).with_property("id", 1i64),
        Feature::new(geo_types::Point::new(2.5, 0.5)).with_property("id", 2i64),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_alternate_executable_and_vectors() {
    let fx = Fixture::new();
    fx.tool(
        "MoveOutletsToStreams",
        r#"printf '%s\n' "$*" > LOG
for ext in shp shx dbf; do cp o.$ext om.$ext; done"#,
    );
    let cmd = registry::moveoutletstostrm().unwrap();

    let out = cmd
        .call()
        .arg(dem())
        .arg(dem())
        .arg(outlets())
        .kwarg("maxdistance", 50i64)
        .run(&fx.settings())
        .unwrap();

    assert_eq!(fx.logged(), "-p p.tif -src src.tif -o o.shp -md 50 -om om.shp");
    let moved = out.into_single().unwrap().into_vector().unwrap();
    assert_eq!(moved.len(), 2);
    let ids: Vec<Option<&AttributeValue>> = moved.iter().map(|f| f.get_property("id")).collect();
    assert_eq!(ids, vec![Some(&AttributeValue::Int(1)), Some(&AttributeValue::Int(2))]);
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_alternates_exhausted() {
    let fx = Fixture::new();
    let result = registry::moveoutletstostrm()
        .unwrap()
        .call()
        .arg(dem())
        .arg(dem())
        .arg(outlets())
        .run(&fx.settings());
    match result {
        Err(CommandError::ExecutableNotFound { candidates, .. }) => assert_eq!(candidates.len(), 2),
        other => panic!("expected ExecutableNotFound, got {other:?}"),
    }
}

#[test]
fn test_dry_run_command_line() {
    let fx = Fixture::new();
    let cmd = registry::streamnet().unwrap();
    let settings = Settings {
        use_mpi: true,
        ..fx.settings()
    };

    let line = cmd
        .call()
        .arg(dem())
        .arg(dem())
        .arg(dem())
        .arg(dem())
        .kwarg("singlewatershed", true)
        .command_line(&settings)
        .unwrap();

    let exe = fx.bin().join("streamnet");
    assert_eq!(
        line.to_string(),
        format!(
            "mpiexec -n 4 {} -fel fel.tif -p p.tif -ad8 ad8.tif -src src.tif -sw \
             -ord ord.tif -tree tree.txt -coord coord.txt -net net.shp -w w.tif",
            exe.display()
        )
    );
    assert!(fx.scratch_is_empty());
}

#[test]
fn test_streamnet_typed_outputs() {
    let fx = Fixture::new();
    let network = fx.dir.path().join("network.shp");
    taudem_core::io::write_shapefile(&outlets(), &network).unwrap();
    fx.tool(
        "streamnet",
        &format!(
            r#"printf '%s\n' "$*" > LOG
printf '0 0 1 -1 -1 -1 1 -1 1\n' > tree.txt
printf '1.5 1.5 0.0 2.0 1.0\n2.5 1.5 1.0 3.0 2.0\n' > coord.txt
cp fel.tif ord.tif
cp ad8.tif w.tif
for ext in shp shx dbf; do cp {}.$ext net.$ext; done"#,
            fx.dir.path().join("network").display()
        ),
    );

    let input = StreamNetInput {
        fel: Raster::from_array(dem()),
        pointer: Raster::from_array(dem()),
        area: Raster::from_array(dem() * 2.0),
        streams: Raster::from_array(dem()),
    };
    let out = StreamNet.run_default(&fx.settings(), input).unwrap();

    assert_eq!(out.order.data(), &dem());
    assert_eq!(out.watersheds.data(), &(dem() * 2.0));
    assert_eq!(out.tree.columns[..3], ["link_no", "start_point", "end_point"]);
    assert_eq!(out.tree.column("next_link").unwrap(), vec!["-1"]);
    let elevation = out.coordinates.column_f64("elevation").unwrap();
    assert_relative_eq!(elevation[0], 2.0);
    assert_relative_eq!(elevation[1], 3.0);
    assert_eq!(out.network.len(), 2);
    assert!(fx.scratch_is_empty());
}
