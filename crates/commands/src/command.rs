//! Command descriptors: a named TauDEM executable and its arguments

use crate::argument::{ArgKind, ArgumentDescriptor};
use crate::error::{CommandError, Result};
use crate::invoke::{self, Call};
use crate::settings::Settings;
use crate::value::{ArgValue, CommandOutput};

/// Keyword-only argument selecting bare-array or georeferenced grid results
pub const AS_ARRAY: &str = "as_array";
/// Keyword-only argument overriding the transform of staged grids
pub const TRANSFORM: &str = "transform";

/// A TauDEM command: canonical name, executable names and argument list
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor {
    name: String,
    alternates: Option<Vec<String>>,
    arguments: Vec<ArgumentDescriptor>,
}

impl CommandDescriptor {
    /// Declare a command whose executable is named after the command.
    ///
    /// The call-only `as_array` and `transform` arguments are appended. Fails
    /// when two arguments share a name, ignoring case.
    pub fn new(name: &str, arguments: Vec<ArgumentDescriptor>) -> Result<Self> {
        Self::build(name, None, arguments)
    }

    /// Declare a command whose executable has shipped under several names.
    /// They are tried in order and the first executable file wins.
    pub fn with_alternates(
        name: &str,
        executables: &[&str],
        arguments: Vec<ArgumentDescriptor>,
    ) -> Result<Self> {
        let alternates = executables.iter().map(|e| e.to_string()).collect();
        Self::build(name, Some(alternates), arguments)
    }

    fn build(
        name: &str,
        alternates: Option<Vec<String>>,
        mut arguments: Vec<ArgumentDescriptor>,
    ) -> Result<Self> {
        arguments.push(ArgumentDescriptor::pseudo(AS_ARRAY, ArgKind::AsArray));
        arguments.push(ArgumentDescriptor::pseudo(TRANSFORM, ArgKind::Transform));

        for (i, arg) in arguments.iter().enumerate() {
            if arguments[..i].iter().any(|prev| prev.matches(arg.name())) {
                return Err(CommandError::DuplicateArgumentName {
                    command: name.to_string(),
                    name: arg.name().to_string(),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            alternates,
            arguments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All arguments in declaration order, pseudo-arguments last
    pub fn arguments(&self) -> &[ArgumentDescriptor] {
        &self.arguments
    }

    pub fn alternates(&self) -> Option<&[String]> {
        self.alternates.as_deref()
    }

    /// Case-insensitive lookup by argument name
    pub fn argument(&self, name: &str) -> Option<&ArgumentDescriptor> {
        self.arguments.iter().find(|a| a.matches(name))
    }

    pub fn inputs(&self) -> impl Iterator<Item = &ArgumentDescriptor> {
        self.arguments.iter().filter(|a| !a.is_output())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &ArgumentDescriptor> {
        self.arguments.iter().filter(|a| a.is_output())
    }

    /// Start a typed call against this command
    pub fn call(&self) -> Call<'_> {
        Call::new(self)
    }

    /// Build a dispatch function bound to `settings`.
    ///
    /// The function takes positional values followed by `(name, value)`
    /// keyword pairs and runs one invocation per call.
    pub fn generate_invocation(
        &self,
        settings: Settings,
    ) -> impl Fn(&[ArgValue], &[(String, ArgValue)]) -> Result<CommandOutput> + '_ {
        move |positional: &[ArgValue], keywords: &[(String, ArgValue)]| {
            invoke::run(self, &settings, positional, keywords)
        }
    }

    /// Usage text: title, inputs, then a `Returns:` section with outputs
    pub fn doc_string(&self) -> String {
        let mut doc = format!("{}\n{}\n\n", self.name, "-".repeat(self.name.len()));
        for arg in self.inputs() {
            doc.push_str(&format!("* {}\n\n", arg.help_text()));
        }
        doc.push_str("Returns:\n");
        for arg in self.outputs() {
            doc.push_str(&format!("* {}\n\n", arg.help_text()));
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitremove() -> CommandDescriptor {
        CommandDescriptor::new(
            "pitremove",
            vec![
                ArgumentDescriptor::grid_input("demgrid", "z"),
                ArgumentDescriptor::grid_output("pitfilleddemgrid", "fel"),
                ArgumentDescriptor::grid_input("upserdirgrid", "sfdr").optional(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_pseudo_arguments_appended() {
        let cmd = pitremove();
        let names: Vec<&str> = cmd.arguments().iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec!["demgrid", "pitfilleddemgrid", "upserdirgrid", "as_array", "transform"]
        );
        assert!(cmd.argument("AS_ARRAY").unwrap().is_pseudo());
        assert!(cmd.alternates().is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dup = CommandDescriptor::new(
            "bad",
            vec![
                ArgumentDescriptor::grid_input("dem", "z"),
                ArgumentDescriptor::grid_output("DEM", "fel"),
            ],
        );
        assert!(matches!(dup, Err(CommandError::DuplicateArgumentName { .. })));

        let clash = CommandDescriptor::new("bad", vec![ArgumentDescriptor::switch("As_Array", "a")]);
        assert!(matches!(clash, Err(CommandError::DuplicateArgumentName { name, .. }) if name == "as_array"));
    }

    #[test]
    fn test_doc_string_layout() {
        let doc = pitremove().doc_string();
        let expected = "pitremove\n---------\n\n\
            * demgrid: grid (required)\n\n\
            * upserdirgrid: grid (optional)\n\n\
            * as_array: boolean (optional)\n\n\
            * transform: transform (optional)\n\n\
            Returns:\n\
            * pitfilleddemgrid: grid (required)\n\n";
        assert_eq!(doc, expected);
    }

    #[test]
    fn test_with_alternates() {
        let cmd = CommandDescriptor::with_alternates(
            "moveoutletstostrm",
            &["moveoutletstostrm", "MoveOutletsToStreams"],
            vec![ArgumentDescriptor::grid_input("d8pointergrid", "p")],
        )
        .unwrap();
        assert_eq!(cmd.alternates().unwrap().len(), 2);
        assert_eq!(cmd.outputs().count(), 0);
    }
}
