//! Error types for command description and invocation

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised while binding, running or unmarshalling a TauDEM command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("too many arguments: {given} given, {command} accepts {accepted} positionally")]
    TooManyArguments {
        command: String,
        given: usize,
        accepted: usize,
    },

    #[error("unknown argument for {command}: {name}")]
    UnknownArgument { command: String, name: String },

    #[error("argument provided by position and keyword: {name}")]
    DuplicateBinding { name: String },

    #[error("missing required argument(s) for {command}: {}", names.join(", "))]
    MissingRequiredArgument { command: String, names: Vec<String> },

    #[error("unsupported argument {name}: {reason}")]
    UnsupportedArgumentType { name: String, reason: String },

    #[error("cannot read result for {name}: {reason}")]
    CannotReadResult { name: String, reason: String },

    #[error("no executable found for {command} (tried {})", candidates.join(", "))]
    ExecutableNotFound {
        command: String,
        candidates: Vec<String>,
    },

    #[error("invalid grid value for {name}: {reason}")]
    InvalidGridValue { name: String, reason: String },

    #[error("cannot write {name} as a vector layer: {reason}")]
    VectorWriteUnsupported { name: String, reason: String },

    #[error("duplicate argument name in {command}: {name}")]
    DuplicateArgumentName { command: String, name: String },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} exited with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("expected {expected} output, got {found}")]
    UnexpectedOutput {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid settings in {path}: {reason}")]
    Settings { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] taudem_core::Error),
}

/// Result alias for command operations.
pub type Result<T> = std::result::Result<T, CommandError>;
