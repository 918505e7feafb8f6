//! taudem CLI - run TauDEM tools on files through the command registry

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use taudem_commands::{registry, ArgKind, ArgValue, CommandDescriptor, OutputValue, Settings};
use taudem_core::io::{
    read_geotiff, read_shapefile, to_geotiff, write_geotiff, write_shapefile, write_table,
    GeoTiffOptions, SampleFormat,
};
use taudem_core::{GeoTransform, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "taudem")]
#[command(author, version, about = "Run TauDEM terrain analysis tools", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing the TauDEM executables
    #[arg(long, global = true)]
    taudem_path: Option<PathBuf>,

    /// Run tools directly instead of through mpiexec
    #[arg(long, global = true)]
    no_mpi: bool,

    /// Number of MPI processes
    #[arg(short = 'n', long, global = true)]
    processes: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available TauDEM commands
    List,
    /// Show the arguments and outputs of a command
    Usage {
        /// Command name
        command: String,
    },
    /// Run a command on files
    Run {
        /// Command name
        command: String,
        /// Argument binding as name=value; .tif and .shp values are loaded
        #[arg(short, long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,
        /// Directory for returned outputs
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// Keep the grids' georeferencing in written outputs
        #[arg(short, long)]
        georeferenced: bool,
        /// Print the command line without running it
        #[arg(long)]
        dry_run: bool,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let base = match &cli.config {
        Some(path) => Settings::from_json_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let mut settings = base.with_env_overrides().context("Invalid TAUDEM_* environment")?;

    if let Some(path) = &cli.taudem_path {
        settings.taudem_path = path.clone();
    }
    if cli.no_mpi {
        settings.use_mpi = false;
    }
    if let Some(n) = cli.processes {
        settings.mpi_processes = n;
    }
    Ok(settings)
}

fn split_binding(binding: &str) -> Result<(&str, &str)> {
    match binding.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => anyhow::bail!("Argument must be 'name=value', got: {}", binding),
    }
}

fn has_extension(value: &str, extensions: &[&str]) -> bool {
    Path::new(value)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Turn one `name=value` into a binding for `cmd`.
///
/// Outputs named on the command line are written straight to that path.
fn parse_value(cmd: &CommandDescriptor, name: &str, value: &str) -> Result<ArgValue> {
    if cmd.argument(name).is_some_and(|a| a.is_output()) {
        return Ok(ArgValue::Path(PathBuf::from(value)));
    }
    if has_extension(value, &["tif", "tiff"]) {
        let raster: Raster<f64> =
            read_geotiff(value, None).with_context(|| format!("Failed to read raster {}", value))?;
        info!("{}: {} x {} grid", name, raster.cols(), raster.rows());
        return Ok(ArgValue::Grid(raster));
    }
    if has_extension(value, &["shp"]) {
        let layer =
            read_shapefile(value).with_context(|| format!("Failed to read shapefile {}", value))?;
        info!("{}: {} features", name, layer.len());
        return Ok(ArgValue::Vector(layer));
    }
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(ArgValue::Flag(true)),
        "false" => Ok(ArgValue::Flag(false)),
        _ => Ok(ArgValue::Scalar(value.to_string())),
    }
}

fn write_output(value: OutputValue, path: &Path) -> Result<()> {
    match value {
        OutputValue::Array(array) => to_geotiff(&array, None::<GeoTransform>, path),
        OutputValue::Grid(raster) => write_geotiff(
            &raster,
            path,
            Some(GeoTiffOptions {
                sample_format: SampleFormat::Float64,
            }),
        ),
        OutputValue::Vector(layer) => write_shapefile(&layer, path),
        OutputValue::Table(table) => write_table(&table, path),
    }
    .with_context(|| format!("Failed to write {}", path.display()))
}

fn run_command(
    settings: &Settings,
    name: &str,
    bindings: &[String],
    out_dir: &Path,
    georeferenced: bool,
    dry_run: bool,
) -> Result<()> {
    let cmd = registry::find_command(name)?;

    let mut call = cmd.call();
    let mut kept = Vec::new();
    for binding in bindings {
        let (arg, value) = split_binding(binding)?;
        let value = parse_value(&cmd, arg, value)?;
        if matches!(value, ArgValue::Path(_)) {
            kept.push(arg.to_ascii_lowercase());
        }
        call = call.kwarg(arg, value);
    }
    call = call.as_array(!georeferenced);

    if dry_run {
        let line = call.command_line(settings).context("Failed to prepare command")?;
        println!("{}", line);
        return Ok(());
    }

    let start = Instant::now();
    let pb = spinner(&format!("Running {}...", cmd.name()));
    let result = call.run(settings);
    pb.finish_and_clear();
    let output = result.with_context(|| format!("{} failed", cmd.name()))?;
    let elapsed = start.elapsed();

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let returned = cmd
        .outputs()
        .filter(|a| !kept.iter().any(|k| a.matches(k)));
    for (arg, value) in returned.zip(output.into_values()) {
        let ext = match arg.kind() {
            ArgKind::Vector => "shp",
            ArgKind::TextTable => "txt",
            _ => "tif",
        };
        let path = out_dir.join(format!("{}.{}", arg.name(), ext));
        write_output(value, &path)?;
        println!("{} saved to: {}", arg.name(), path.display());
    }
    println!("  Processing time: {:.2?}", elapsed);
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match &cli.command {
        Commands::List => {
            for cmd in registry::commands()? {
                let inputs = cmd.inputs().filter(|a| !a.is_pseudo()).count();
                let outputs = cmd.outputs().count();
                println!("{:<20} {} inputs, {} outputs", cmd.name(), inputs, outputs);
            }
        }

        Commands::Usage { command } => {
            let cmd = registry::find_command(command)?;
            print!("{}", cmd.doc_string());
        }

        Commands::Run {
            command,
            args,
            out_dir,
            georeferenced,
            dry_run,
        } => {
            let settings = load_settings(&cli)?;
            run_command(&settings, command, args, out_dir, *georeferenced, *dry_run)?;
        }

        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let raster: Raster<f64> = read_geotiff(input, None).context("Failed to read raster")?;
            pb.finish_and_clear();
            let (rows, cols) = raster.shape();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!("Transform: {:?}", raster.transform().to_gdal());
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            if !raster.is_empty() {
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len() as f64
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_binding() {
        assert_eq!(split_binding("threshold=100").unwrap(), ("threshold", "100"));
        assert_eq!(split_binding("par = 5 -1").unwrap(), ("par", "5 -1"));
        assert!(split_binding("threshold").is_err());
        assert!(split_binding("=5").is_err());
    }

    #[test]
    fn test_parse_value_by_kind() {
        let cmd = registry::aread8().unwrap();
        assert_eq!(parse_value(&cmd, "nc", "TRUE").unwrap(), ArgValue::Flag(true));
        assert_eq!(
            parse_value(&cmd, "upstreamareagrid", "out/ad8.tif").unwrap(),
            ArgValue::Path(PathBuf::from("out/ad8.tif"))
        );
        assert_eq!(parse_value(&cmd, "anything", "12.5").unwrap(), ArgValue::from("12.5"));
        assert!(parse_value(&cmd, "d8pointergrid", "/definitely/missing.tif").is_err());
    }

    #[test]
    fn test_extension_match() {
        assert!(has_extension("dem.TIF", &["tif", "tiff"]));
        assert!(!has_extension("dem.tif.txt", &["tif"]));
        assert!(!has_extension("dem", &["tif"]));
    }
}
