//! Command descriptors and the template table they are built from.
//!
//! A [`CommandDescriptor`] is the in-memory form of one request: which
//! variable of which command group to address, for which object, with which
//! typed parameters, and what the response must look like. Descriptors are
//! produced from [`CommandTemplate`]s so that every variant of a command keeps
//! the exact parameter order and type tags it is declared with.
//!
//! # Example
//!
//! ```
//! use traci_core::simulation;
//! use traci_core::value::Value;
//!
//! let cmd = simulation::registry()
//!     .build("convert_2d", "edge_7", vec![Value::Double(12.5), Value::Byte(1), Value::flag(false)])
//!     .unwrap();
//! assert_eq!(cmd.target(), "edge_7");
//! assert_eq!(cmd.parameters().len(), 3);
//! ```

use thiserror::Error;

use crate::value::{TypeTag, Value};

/// A typed request parameter.
pub type Parameter = Value;

/// Local contract violations caught while building a descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No template is registered under this name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A target id was supplied to a command that addresses the whole simulation.
    #[error("{command} does not take a target id")]
    UnexpectedTarget { command: &'static str },

    /// A command that addresses an object was given an empty target id.
    #[error("{command} requires a target id")]
    MissingTarget { command: &'static str },

    /// Wrong number of parameters.
    #[error("{command} takes {expected} parameters, got {actual}")]
    Arity {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A parameter has the wrong type.
    #[error("{command} parameter {index}: expected {expected}, got {actual}")]
    ParameterType {
        command: &'static str,
        index: usize,
        expected: TypeTag,
        actual: TypeTag,
    },
}

// ---------------------------------------------------------------------------
// CommandDescriptor
// ---------------------------------------------------------------------------

/// One fully specified request and the contract for its response.
///
/// Immutable once built; cloning is the only way to reuse one.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor {
    name: &'static str,
    command_group: u8,
    variable: u8,
    target: String,
    parameters: Vec<Parameter>,
    expected_response_group: Option<u8>,
    expected_response_type: Option<TypeTag>,
}

impl CommandDescriptor {
    /// A descriptor with no response expectation beyond the status section.
    ///
    /// Use [`expecting`](Self::expecting) to attach a result contract.
    pub fn new(
        name: &'static str,
        command_group: u8,
        variable: u8,
        target: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Self {
        Self {
            name,
            command_group,
            variable,
            target: target.into(),
            parameters,
            expected_response_group: None,
            expected_response_type: None,
        }
    }

    /// Require the response to carry a result section in `group`, and, when
    /// `value_type` is given, a value of that type.
    pub fn expecting(mut self, group: u8, value_type: Option<TypeTag>) -> Self {
        self.expected_response_group = Some(group);
        self.expected_response_type = value_type;
        self
    }

    /// Short static name, used for logging.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn command_group(&self) -> u8 {
        self.command_group
    }

    pub fn variable(&self) -> u8 {
        self.variable
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn expected_response_group(&self) -> Option<u8> {
        self.expected_response_group
    }

    pub fn expected_response_type(&self) -> Option<TypeTag> {
        self.expected_response_type
    }
}

// ---------------------------------------------------------------------------
// CommandTemplate
// ---------------------------------------------------------------------------

/// The static shape of one logical command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplate {
    name: &'static str,
    command_group: u8,
    variable: u8,
    takes_target: bool,
    parameters: &'static [TypeTag],
    response: Option<(u8, TypeTag)>,
}

impl CommandTemplate {
    /// A parameterless read of a simulation-wide variable.
    pub const fn getter(
        name: &'static str,
        command_group: u8,
        variable: u8,
        response_group: u8,
        response_type: TypeTag,
    ) -> Self {
        Self {
            name,
            command_group,
            variable,
            takes_target: false,
            parameters: &[],
            response: Some((response_group, response_type)),
        }
    }

    /// A write acknowledged by status only.
    pub const fn setter(
        name: &'static str,
        command_group: u8,
        variable: u8,
        parameters: &'static [TypeTag],
    ) -> Self {
        Self {
            name,
            command_group,
            variable,
            takes_target: false,
            parameters,
            response: None,
        }
    }

    /// Declare the parameter signature.
    pub const fn with_parameters(mut self, parameters: &'static [TypeTag]) -> Self {
        self.parameters = parameters;
        self
    }

    /// Require callers to supply a non-empty target id.
    pub const fn with_target(mut self) -> Self {
        self.takes_target = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn takes_target(&self) -> bool {
        self.takes_target
    }

    pub fn parameters(&self) -> &'static [TypeTag] {
        self.parameters
    }

    pub fn response(&self) -> Option<(u8, TypeTag)> {
        self.response
    }

    /// Build a descriptor, checking target and parameters against the template.
    pub fn build(&self, target: &str, args: Vec<Parameter>) -> Result<CommandDescriptor, CommandError> {
        match (self.takes_target, target.is_empty()) {
            (false, false) => {
                return Err(CommandError::UnexpectedTarget { command: self.name });
            }
            (true, true) => {
                return Err(CommandError::MissingTarget { command: self.name });
            }
            _ => {}
        }
        if args.len() != self.parameters.len() {
            return Err(CommandError::Arity {
                command: self.name,
                expected: self.parameters.len(),
                actual: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(self.parameters).enumerate() {
            let actual = arg.type_tag();
            if actual != *expected {
                return Err(CommandError::ParameterType {
                    command: self.name,
                    index,
                    expected: *expected,
                    actual,
                });
            }
        }
        Ok(self.instantiate(target, args))
    }

    /// Build a descriptor without checking the arguments.
    ///
    /// Only for callers whose argument types are fixed by their own signature.
    pub(crate) fn instantiate(&self, target: &str, args: Vec<Parameter>) -> CommandDescriptor {
        let cmd = CommandDescriptor::new(self.name, self.command_group, self.variable, target, args);
        match self.response {
            Some((group, value_type)) => cmd.expecting(group, Some(value_type)),
            None => cmd,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A name-keyed set of command templates.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    templates: &'static [&'static CommandTemplate],
}

impl Registry {
    pub const fn new(templates: &'static [&'static CommandTemplate]) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> impl Iterator<Item = &'static CommandTemplate> {
        self.templates.iter().copied()
    }

    pub fn get(&self, name: &str) -> Option<&'static CommandTemplate> {
        self.templates().find(|t| t.name == name)
    }

    /// Look up `name` and build a checked descriptor from it.
    pub fn build(&self, name: &str, target: &str, args: Vec<Parameter>) -> Result<CommandDescriptor, CommandError> {
        self.get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_owned()))?
            .build(target, args)
    }
}
