//! Lowering and lowered-execution error types.

use ember_analyze::AnalyzeError;

/// Errors raised while translating a design to Verilog.
#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    /// The design failed elaboration or analysis.
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),

    /// A rule uses a construct the lowering cannot express faithfully.
    #[error("cannot translate rule '{rule}': {construct}")]
    Translation {
        /// Path of the rule.
        rule: String,
        /// Description of the offending construct.
        construct: String,
    },

    /// Writing the output file failed.
    #[error("failed to write lowered output: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while executing a lowered module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// No port has this name.
    #[error("'{name}' is not a port of the lowered module")]
    NotAPort {
        /// The requested name.
        name: String,
    },

    /// The port is an output or the clock.
    #[error("'{name}' cannot be driven from outside the lowered module")]
    NotAnInput {
        /// The port name.
        name: String,
    },

    /// A value has the wrong width for its port.
    #[error("value for '{name}' is {actual} bits wide, expected {expected}")]
    WidthMismatch {
        /// The port name.
        name: String,
        /// Declared width.
        expected: u32,
        /// Width of the supplied value.
        actual: u32,
    },

    /// An expression names something the module does not declare.
    #[error("undeclared identifier '{name}'")]
    Undeclared {
        /// The identifier.
        name: String,
    },

    /// A `$fatal` task ran.
    #[error("$fatal: {message}")]
    Fatal {
        /// The task's message argument.
        message: String,
    },

    /// Division or remainder by zero.
    #[error("division by zero in '{item}'")]
    DivisionByZero {
        /// Description of the item being evaluated.
        item: String,
    },

    /// Continuous logic did not settle.
    #[error("combinational logic did not settle after {passes} passes")]
    Oscillation {
        /// The pass bound.
        passes: u32,
    },

    /// A previous error left the executor in an undefined state.
    #[error("lowered module failed earlier; reset it before continuing")]
    Failed,
}
