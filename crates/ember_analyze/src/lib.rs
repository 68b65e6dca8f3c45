//! Usage analysis and dependency building for Ember designs.
//!
//! [`analyze_rule`] walks one rule body and reports what it reads and writes,
//! which writes happen on every path, and which temporaries it declares.
//! [`analyze_design`] runs that over every rule, resolves the single driver of
//! each storage net, and builds the [`DependencyGraph`] between combinational
//! rules, rejecting combinational cycles. The [`width`] module holds the static
//! width rules shared with the simulator and the lowering engine.

#![warn(missing_docs)]

pub mod analysis;
pub mod deps;
pub mod error;
pub mod usage;
pub mod width;

pub use analysis::{analyze_design, DesignAnalysis, Driver};
pub use deps::DependencyGraph;
pub use error::AnalyzeError;
pub use usage::{analyze_rule, range_values, Coverage, RuleUsage};
pub use width::{expr_width, fold_int, static_slice_width, LocalScope, Width, WidthError};
