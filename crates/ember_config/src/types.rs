//! Configuration types deserialized from `ember.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The top-level configuration parsed from `ember.toml`.
///
/// Every section and field is optional; a missing file is equivalent to an
/// empty one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EmberConfig {
    /// Simulation engine settings.
    #[serde(default)]
    pub sim: SimConfig,
    /// Lowering engine settings.
    #[serde(default)]
    pub lower: LowerConfig,
}

/// What to do when a runtime index selects past the end of a signal array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPolicy {
    /// Fail the simulation with an index-out-of-range error.
    #[default]
    Error,
    /// Select the last element of the array.
    Clamp,
}

impl fmt::Display for IndexPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexPolicy::Error => write!(f, "error"),
            IndexPolicy::Clamp => write!(f, "clamp"),
        }
    }
}

/// Settings for the cycle-accurate simulation engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimConfig {
    /// Maximum number of settle passes per phase before reporting oscillation.
    pub max_settle_passes: u32,
    /// Out-of-range dynamic index behavior.
    pub index_policy: IndexPolicy,
    /// Print the per-cycle line trace from `ember sim`.
    pub trace: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_settle_passes: 64,
            index_policy: IndexPolicy::Error,
            trace: false,
        }
    }
}

/// Settings for the Verilog lowering engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LowerConfig {
    /// Static loops with at most this many iterations are fully unrolled.
    pub unroll_limit: u32,
    /// Name of the clock input added for sequential logic.
    pub clock: String,
    /// Spaces per indentation level in the emitted text.
    pub indent: usize,
    /// Out-of-range dynamic index behavior in the emitted selectors.
    pub index_policy: IndexPolicy,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            unroll_limit: 16,
            clock: "clk".to_string(),
            indent: 2,
            index_policy: IndexPolicy::Error,
        }
    }
}
