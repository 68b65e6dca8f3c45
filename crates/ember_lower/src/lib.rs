//! Lowering of Ember designs to synthesizable Verilog-2001.
//!
//! The lowering flattens the module hierarchy into one Verilog module whose
//! ports are the top module's ports plus a clock when the design has
//! sequential rules. The result is a structured [`LoweredModule`] that
//! [`emit_verilog`] renders as text and [`LoweredSim`] executes, so a
//! lowering can be checked cycle by cycle against the native simulator.
//!
//! # Usage
//!
//! ```ignore
//! use ember_config::LowerConfig;
//! use ember_diagnostics::DiagnosticSink;
//!
//! let sink = DiagnosticSink::new();
//! let module = ember_lower::lower(&design, &LowerConfig::default(), &sink)?;
//! print!("{}", ember_lower::emit_verilog(&module, 2));
//! ```
//!
//! # Modules
//!
//! - `error`: Lowering and execution error types
//! - `vast`: Verilog syntax tree produced by the lowering
//! - `lower`: Translation from rules to Verilog items
//! - `emit`: Verilog text output
//! - `lowered_sim`: Two-state execution of lowered modules

#![warn(missing_docs)]

pub mod emit;
pub mod error;
pub mod lower;
pub mod lowered_sim;
pub mod vast;

pub use emit::{emit_verilog, lower_to_file};
pub use error::{ExecError, LowerError};
pub use lower::{flat_name, lower, lower_analyzed};
pub use lowered_sim::{LoweredSim, Phase};
pub use vast::{
    LoweredModule, Trigger, VAssign, VBlock, VCaseArm, VDecl, VExpr, VItem, VLValue, VPort,
    VStmt, VarKind,
};
