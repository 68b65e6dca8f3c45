//! Cycle-accurate simulator for Ember designs.
//!
//! The simulator consumes a validated [`Design`](ember_ir::Design) and runs it
//! one clock cycle at a time with 2-state values. Combinational rules are
//! re-evaluated to a fixed point in dependency order; sequential rules compute
//! their next values from one consistent snapshot and commit together.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use ember_sim::{Simulator, SimConfig};
//!
//! let mut sim = Simulator::new(Arc::new(design), SimConfig::default())?;
//! sim.set_u64("a", 3)?;
//! sim.step()?;
//! println!("{}", sim.line_trace()?);
//! ```
//!
//! # Modules
//!
//! - `error`: Simulation error types
//! - `value`: Run-time values and operator semantics
//! - `eval`: Rule body execution
//! - `trace`: Per-cycle line trace
//! - `simulator`: The cycle state machine and stepping API

#![warn(missing_docs)]

pub mod error;
mod eval;
pub mod simulator;
pub mod trace;
pub mod value;

pub use ember_config::{IndexPolicy, SimConfig};
pub use error::SimError;
pub use simulator::{Phase, Simulator};
pub use trace::{format_line, LineTrace, TraceSink};
pub use value::Value;
