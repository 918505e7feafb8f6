//! Binding call arguments and running a TauDEM executable
//!
//! One invocation binds positional and keyword values to a command's
//! arguments, stages inputs in a fresh scratch directory, runs the tool with
//! that directory as its working directory and reads the unbound outputs
//! back. The scratch directory is removed on every exit path.

use crate::argument::{ArgKind, ArgumentDescriptor, TransformContext};
use crate::command::{CommandDescriptor, AS_ARRAY, TRANSFORM};
use crate::error::{CommandError, Result};
use crate::settings::Settings;
use crate::value::{ArgValue, CommandOutput};
use crate::which::{which, EXE_SUFFIX};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use taudem_core::GeoTransform;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Builder for one call of a command
///
/// ```ignore
/// let fel = registry::find_command("pitremove")?
///     .call()
///     .arg(dem)
///     .run(&settings)?
///     .into_single()?
///     .into_array()?;
/// ```
#[derive(Debug, Clone)]
pub struct Call<'a> {
    command: &'a CommandDescriptor,
    positional: Vec<ArgValue>,
    keywords: Vec<(String, ArgValue)>,
}

impl<'a> Call<'a> {
    pub fn new(command: &'a CommandDescriptor) -> Self {
        Self {
            command,
            positional: Vec::new(),
            keywords: Vec::new(),
        }
    }

    /// Bind the next positional argument
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Bind an argument by name (case-insensitive)
    pub fn kwarg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.keywords.push((name.to_string(), value.into()));
        self
    }

    /// Return grid outputs as bare arrays (`true`, the default) or rasters
    pub fn as_array(self, as_array: bool) -> Self {
        self.kwarg(AS_ARRAY, as_array)
    }

    /// Georeference bare-array inputs with `transform`
    pub fn transform(self, transform: impl Into<GeoTransform>) -> Self {
        self.kwarg(TRANSFORM, transform.into())
    }

    pub fn command(&self) -> &CommandDescriptor {
        self.command
    }

    pub fn run(&self, settings: &Settings) -> Result<CommandOutput> {
        run(self.command, settings, &self.positional, &self.keywords)
    }

    /// The command line a run would execute, without running it
    pub fn command_line(&self, settings: &Settings) -> Result<Invocation> {
        let bindings = bind(self.command, &self.positional, &self.keywords)?;
        let scratch = ScratchDir::create(settings.scratch_root.as_deref())?;
        prepare(self.command, settings, &bindings, scratch.path())
    }
}

/// Program and arguments of a prepared tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Every token, program first
    pub fn tokens(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens().join(" "))
    }
}

/// Arguments of one call after binding
#[derive(Debug)]
pub(crate) struct Bindings<'a> {
    /// In binding order: positionals, then keywords as given
    pub bound: Vec<(&'a ArgumentDescriptor, &'a ArgValue)>,
    /// Unbound outputs in declaration order; these are read back
    pub placeholders: Vec<&'a ArgumentDescriptor>,
    pub as_array: bool,
    pub transforms: TransformContext,
}

pub(crate) fn bind<'a>(
    command: &'a CommandDescriptor,
    positional: &'a [ArgValue],
    keywords: &'a [(String, ArgValue)],
) -> Result<Bindings<'a>> {
    let pool: Vec<&ArgumentDescriptor> =
        command.arguments().iter().filter(|a| !a.is_pseudo()).collect();
    if positional.len() > pool.len() {
        return Err(CommandError::TooManyArguments {
            command: command.name().to_string(),
            given: positional.len(),
            accepted: pool.len(),
        });
    }

    let mut bound: Vec<(&ArgumentDescriptor, &ArgValue)> =
        pool.iter().copied().zip(positional.iter()).collect();
    let mut remaining = pool[positional.len()..].to_vec();
    let mut as_array: Option<bool> = None;
    let mut explicit: Option<GeoTransform> = None;

    for (name, value) in keywords {
        if let Some(pseudo) = command.arguments().iter().find(|a| a.is_pseudo() && a.matches(name)) {
            let duplicate = match pseudo.kind() {
                ArgKind::AsArray => as_array.replace(value.is_truthy()).is_some(),
                _ => match value {
                    ArgValue::Transform(gt) => explicit.replace(*gt).is_some(),
                    other => {
                        return Err(CommandError::UnsupportedArgumentType {
                            name: pseudo.name().to_string(),
                            reason: format!("expected a transform, got {}", other.kind_name()),
                        })
                    }
                },
            };
            if duplicate {
                return Err(CommandError::DuplicateBinding { name: name.clone() });
            }
            continue;
        }

        match remaining.iter().position(|a| a.matches(name)) {
            Some(i) => bound.push((remaining.remove(i), value)),
            None if command.argument(name).is_some() => {
                return Err(CommandError::DuplicateBinding { name: name.clone() })
            }
            None => {
                return Err(CommandError::UnknownArgument {
                    command: command.name().to_string(),
                    name: name.clone(),
                })
            }
        }
    }

    let missing: Vec<String> = remaining
        .iter()
        .filter(|a| !a.is_output() && !a.is_optional())
        .map(|a| a.name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CommandError::MissingRequiredArgument {
            command: command.name().to_string(),
            names: missing,
        });
    }

    let ambient = bound.iter().find_map(|(arg, value)| match value {
        ArgValue::Grid(grid) if !arg.is_output() && arg.kind() == ArgKind::Grid => {
            Some(*grid.transform())
        }
        _ => None,
    });
    let placeholders = remaining.into_iter().filter(|a| a.is_output()).collect();

    debug!(
        command = command.name(),
        bound = ?bound.iter().map(|(a, v)| (a.name(), v.kind_name())).collect::<Vec<_>>(),
        "bound arguments"
    );

    Ok(Bindings {
        bound,
        placeholders,
        as_array: as_array.unwrap_or(true),
        transforms: TransformContext { explicit, ambient },
    })
}

/// Run `command` once with the given values
pub(crate) fn run(
    command: &CommandDescriptor,
    settings: &Settings,
    positional: &[ArgValue],
    keywords: &[(String, ArgValue)],
) -> Result<CommandOutput> {
    let bindings = bind(command, positional, keywords)?;
    let scratch = ScratchDir::create(settings.scratch_root.as_deref())?;
    let invocation = prepare(command, settings, &bindings, scratch.path())?;

    execute(command, settings, &invocation, scratch.path())?;

    let values = bindings
        .placeholders
        .iter()
        .map(|arg| arg.read_result(scratch.path(), bindings.as_array))
        .collect::<Result<Vec<_>>>()?;
    Ok(CommandOutput::from_values(values))
}

fn prepare(
    command: &CommandDescriptor,
    settings: &Settings,
    bindings: &Bindings<'_>,
    scratch: &Path,
) -> Result<Invocation> {
    let executable = resolve_executable(command, settings)?;

    let mut tokens = Vec::new();
    for (arg, value) in &bindings.bound {
        let value = persistent_destination(arg, value)?;
        tokens.extend(arg.generate(Some(value.as_ref()), &bindings.transforms, scratch)?);
    }
    for arg in &bindings.placeholders {
        tokens.extend(arg.generate(None, &bindings.transforms, scratch)?);
    }

    let mut line = settings.launcher_prefix();
    line.push(absolute_program(&executable)?.display().to_string());
    line.extend(tokens);
    let program = line.remove(0);

    Ok(Invocation { program, args: line })
}

/// Relative output paths name a location in the caller's working directory,
/// not the scratch directory the tool runs in.
fn persistent_destination<'v>(arg: &ArgumentDescriptor, value: &'v ArgValue) -> Result<Cow<'v, ArgValue>> {
    match value {
        ArgValue::Path(path) if arg.is_output() && path.is_relative() => {
            Ok(Cow::Owned(ArgValue::Path(std::env::current_dir()?.join(path))))
        }
        _ => Ok(Cow::Borrowed(value)),
    }
}

/// Resolve a relative program path against the caller's working directory,
/// since the child starts in the scratch directory. Bare names are left for
/// the `PATH` lookup.
fn absolute_program(path: &Path) -> Result<PathBuf> {
    if path.is_relative() && path.components().count() > 1 {
        Ok(std::env::current_dir()?.join(path))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Path of the executable implementing `command`.
///
/// Without alternates this is `taudem_path/<name>`. With alternates each
/// `<name><EXE_SUFFIX>` is tried in order, under `taudem_path` or on `PATH`
/// when it is empty.
pub fn resolve_executable(command: &CommandDescriptor, settings: &Settings) -> Result<PathBuf> {
    let Some(names) = command.alternates() else {
        return Ok(settings.taudem_path.join(command.name()));
    };

    let candidates: Vec<PathBuf> = names
        .iter()
        .map(|name| settings.taudem_path.join(format!("{name}{EXE_SUFFIX}")))
        .collect();
    if let Some(found) = candidates.iter().find_map(which) {
        debug!(command = command.name(), executable = %found.display(), "resolved executable");
        return Ok(found);
    }

    Err(CommandError::ExecutableNotFound {
        command: command.name().to_string(),
        candidates: candidates.iter().map(|c| c.display().to_string()).collect(),
    })
}

fn execute(
    command: &CommandDescriptor,
    settings: &Settings,
    invocation: &Invocation,
    scratch: &Path,
) -> Result<()> {
    info!(command = command.name(), "command line: {invocation}");

    let output = Command::new(&invocation.program)
        .args(&invocation.args)
        .current_dir(scratch)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommandError::ExecutableNotFound {
                command: command.name().to_string(),
                candidates: vec![invocation.program.clone()],
            },
            _ => CommandError::Io(e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(command = command.name(), "stdout: {}", stdout.trim_end());
    debug!(command = command.name(), "stderr: {}", stderr.trim_end());

    if !output.status.success() {
        if settings.check_exit_status {
            return Err(CommandError::ToolFailed {
                command: command.name().to_string(),
                status: output.status,
                stderr: stderr.trim_end().to_string(),
            });
        }
        warn!(command = command.name(), status = %output.status, "tool exited unsuccessfully");
    }
    Ok(())
}

/// Scratch directory that is removed when dropped
pub(crate) struct ScratchDir {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchDir {
    pub(crate) fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("taudem_");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        debug!(scratch = %path.display(), "created scratch directory");
        Ok(Self { path, dir: Some(dir) })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(scratch = %self.path.display(), "removed scratch directory"),
                Err(e) => warn!(scratch = %self.path.display(), error = %e, "failed to remove scratch directory"),
            }
        }
    }
}
