//! Elaboration errors: malformed model-graph topology.

/// Errors that make a design unusable before any simulation or lowering.
///
/// Every variant names the offending entities by hierarchical path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElabError {
    /// An ID does not refer to an entity of the design.
    #[error("invalid {kind} id {index}")]
    InvalidId {
        /// Entity kind ("module", "signal", ...).
        kind: &'static str,
        /// The raw index.
        index: u32,
    },

    /// A module is reachable from more than one parent, or its parent link disagrees.
    #[error("module '{module}' is not exclusively owned by a single parent")]
    OwnershipViolation {
        /// Path of the module.
        module: String,
    },

    /// A signal has zero width.
    #[error("signal '{signal}' has zero width")]
    ZeroWidth {
        /// Path of the signal.
        signal: String,
    },

    /// A constant without an initial value.
    #[error("constant '{signal}' has no value")]
    MissingConstantValue {
        /// Path of the constant.
        signal: String,
    },

    /// An initial value whose width differs from its signal.
    #[error("initial value of '{signal}' is {actual} bits, expected {expected}")]
    InitWidth {
        /// Path of the signal.
        signal: String,
        /// Signal width.
        expected: u32,
        /// Width of the initial value.
        actual: u32,
    },

    /// An empty signal array, or one whose elements differ in type.
    #[error("signal array '{array}' is malformed: {reason}")]
    MalformedArray {
        /// Path of the array.
        array: String,
        /// What is wrong.
        reason: String,
    },

    /// A rule, connection, or array refers to a signal outside its scope.
    #[error("'{user}' references '{signal}', which is not declared in its module or a direct child's ports")]
    UndeclaredSignal {
        /// Path of the referring rule, module, or array.
        user: String,
        /// Path of the referenced signal.
        signal: String,
    },

    /// Two connected signals have different widths.
    #[error("cannot connect '{a}' ({a_width} bits) to '{b}' ({b_width} bits)")]
    ConnectionWidth {
        /// First endpoint.
        a: String,
        /// Width of the first endpoint.
        a_width: u32,
        /// Second endpoint.
        b: String,
        /// Width of the second endpoint.
        b_width: u32,
    },

    /// A storage net has more than one driver.
    #[error("net '{net}' has multiple drivers: {}", drivers.join(", "))]
    MultipleDrivers {
        /// Canonical signal path of the net.
        net: String,
        /// Descriptions of each driver.
        drivers: Vec<String>,
    },

    /// A struct field that does not exist on the accessed type.
    #[error("'{user}' accesses unknown field '{field}'")]
    UnknownField {
        /// Path of the referring rule.
        user: String,
        /// The field name.
        field: String,
    },
}
