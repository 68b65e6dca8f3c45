//! Simulation error types.
//!
//! Construction errors wrap the analyzer's structural errors. Everything else
//! is raised while running cycles and names the rule and signal involved.

use ember_analyze::AnalyzeError;
use ember_common::InternalError;

/// Errors that can occur during simulator construction or execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// The design failed elaboration or analysis.
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),

    /// Settling did not reach a fixed point within the pass bound.
    #[error(
        "combinational logic did not settle after {passes} passes; still changing: {}",
        rules.join(", ")
    )]
    Oscillation {
        /// The configured pass bound.
        passes: u32,
        /// Rules still pending re-evaluation when the bound was hit.
        rules: Vec<String>,
    },

    /// A rule read a signal that nothing drives.
    #[error("rule '{rule}' reads undriven signal '{signal}'")]
    UndrivenSignal {
        /// Path of the signal.
        signal: String,
        /// Path of the reading rule.
        rule: String,
    },

    /// The caller read a signal that has no driver and no initial value.
    #[error("signal '{signal}' has no driver and no initial value")]
    UndrivenRead {
        /// Path of the signal.
        signal: String,
    },

    /// A value passed to the stepping API has the wrong width.
    #[error("value for '{signal}' is {actual} bits wide, expected {expected}")]
    WidthMismatch {
        /// Name of the port.
        signal: String,
        /// Declared width.
        expected: u32,
        /// Width of the supplied value.
        actual: u32,
    },

    /// A run-time index selected past the end of a signal array.
    #[error("rule '{rule}' indexes '{array}' with {index}, but it has {len} elements")]
    IndexOutOfRange {
        /// Path of the rule.
        rule: String,
        /// Path of the array.
        array: String,
        /// The index value, saturated to `u64`.
        index: u64,
        /// Number of elements.
        len: usize,
    },

    /// Division or remainder by zero.
    #[error("division by zero in rule '{rule}'")]
    DivisionByZero {
        /// Path of the rule.
        rule: String,
    },

    /// No top-level port has this name.
    #[error("'{name}' is not a top-level port")]
    NotAPort {
        /// The requested name.
        name: String,
    },

    /// The port is an output and cannot be set.
    #[error("'{name}' is an output port and cannot be set")]
    NotAnInput {
        /// The port name.
        name: String,
    },

    /// No signal has this path.
    #[error("no signal at path '{path}'")]
    UnknownSignal {
        /// The requested path.
        path: String,
    },

    /// An earlier run-time error ended this simulation.
    #[error("simulation stopped by an earlier error")]
    Failed,

    /// Writing the trace failed.
    #[error("trace output failed: {0}")]
    Trace(String),

    /// The evaluator met a state the analyzer should have ruled out.
    #[error("in rule '{rule}': {source}")]
    Internal {
        /// Path of the rule.
        rule: String,
        /// What went wrong.
        #[source]
        source: InternalError,
    },
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Trace(err.to_string())
    }
}
