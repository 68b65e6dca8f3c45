//! Diagnostic creation, severity management, and terminal rendering.
//!
//! Non-fatal findings produced while analyzing or lowering a design (latch
//! hazards, empty sequential rules, oversized unrolls) are reported as
//! structured [`Diagnostic`] messages. The thread-safe [`DiagnosticSink`]
//! accumulates them, and [`TerminalRenderer`] formats them for the CLI.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
