//! # taudem-commands
//!
//! Describe TauDEM command-line tools declaratively and call them with
//! in-memory values.
//!
//! A [`CommandDescriptor`] lists a tool's arguments. Calling it binds values
//! by position or keyword, stages grid and vector inputs as files in a
//! scratch directory, runs the executable (optionally under `mpiexec`) and
//! reads the outputs back as arrays, rasters, vector layers or tables.
//!
//! ```ignore
//! use taudem_commands::{registry, Settings};
//!
//! let settings = Settings::serial();
//! let pitremove = registry::find_command("pitremove")?;
//! let fel = pitremove.call().arg(dem).run(&settings)?.into_single()?.into_array()?;
//! ```

pub mod argument;
pub mod command;
pub mod error;
pub mod invoke;
pub mod registry;
pub mod settings;
pub mod tools;
pub mod value;
pub mod which;

pub use argument::{ArgKind, ArgumentDescriptor, Direction};
pub use command::CommandDescriptor;
pub use error::{CommandError, Result};
pub use invoke::{resolve_executable, Call, Invocation};
pub use settings::Settings;
pub use tools::Tool;
pub use value::{ArgValue, CommandOutput, OutputValue};
pub use which::which;
